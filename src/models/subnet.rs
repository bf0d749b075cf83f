//! DHCP subnet data model.

use super::{AddressGroup, IpRange, Ipv4};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// A subnet as written in the desired configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SubnetSpec {
    /// CIDR block, e.g. "10.1.2.0/24".
    pub cidr: String,
    /// Explicit default gateway handed to DHCP clients.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_gw: Option<String>,
    /// Explicit pool ranges, each "<start>-<end>".
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_pool: Vec<String>,
}

impl SubnetSpec {
    pub fn new(cidr: &str) -> SubnetSpec {
        SubnetSpec {
            cidr: cidr.to_string(),
            ..Default::default()
        }
    }

    pub fn with_gateway(mut self, gateway: &str) -> SubnetSpec {
        self.default_gw = Some(gateway.to_string());
        self
    }

    pub fn with_pool(mut self, ranges: &[&str]) -> SubnetSpec {
        self.ip_pool = ranges.iter().map(|r| r.to_string()).collect();
        self
    }
}

/// A fully resolved subnet: gateway, interface address and disjoint pools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    /// Normalised CIDR block (host bits cleared), the subnet's identity.
    pub cidr: Ipv4,
    pub network_address: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub default_gateway: Ipv4Addr,
    /// Address the gateway interface takes on this subnet.
    pub interface_address: Ipv4Addr,
    /// Sorted ascending by start, pairwise disjoint.
    pub pool_ranges: Vec<IpRange>,
}

impl Subnet {
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.cidr.contains(addr)
    }

    /// The (address, netmask) pair the gateway interface carries.
    pub fn address_group(&self) -> AddressGroup {
        AddressGroup {
            primary_address: self.interface_address,
            subnet_mask: self.netmask,
        }
    }

    /// Same slot footprint, so a change can be applied to the pools alone.
    pub fn same_interface(&self, other: &Subnet) -> bool {
        self.interface_address == other.interface_address && self.netmask == other.netmask
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pools: Vec<String> = self.pool_ranges.iter().map(|r| r.to_string()).collect();
        write!(
            f,
            "{} gw={} if={} pool=[{}]",
            self.cidr,
            self.default_gateway,
            self.interface_address,
            pools.join(", ")
        )
    }
}
