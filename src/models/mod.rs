//! Domain models for gateway DHCP configuration.
//!
//! This module contains the core data structures used throughout the crate:
//! - [`Ipv4`] and [`IpRange`] - CIDR blocks and address ranges with their arithmetic
//! - [`SubnetSpec`] and [`Subnet`] - raw and resolved DHCP subnets
//! - [`LogicalNetworkAssignment`] - subnets grouped by logical network
//! - [`GatewayDescriptor`] - the appliance's interface slots and DHCP pools

mod assignment;
mod gateway;
mod ipv4;
mod subnet;

// Re-export public types
pub use assignment::{AssignmentSet, DhcpServiceSpec, LogicalNetworkAssignment, LogicalNetworkSpec};
pub use gateway::{AddressGroup, GatewayDescriptor, InterfaceSlot, ProvisionedPool};
pub use ipv4::{
    broadcast_addr, cidr_to_usable_range, cut_addr, exclude_address, from_int, get_cidr_mask,
    parse_range_endpoints, ranges_overlap, to_int, IpRange, Ipv4, MAX_LENGTH,
};
pub use subnet::{Subnet, SubnetSpec};
