//! Access to the gateway-management service.
//!
//! - [`GatewayApi`] - the operations reconciliation needs from the service
//! - [`client`] - blocking HTTP implementation
//! - [`state`] - the locally persisted last-applied configuration

pub mod client;
pub mod state;

pub use client::HttpGatewayClient;
pub use state::{clear_state, read_state, write_state, AppliedState};

use crate::error::ExternalServiceError;
use crate::models::{GatewayDescriptor, IpRange, ProvisionedPool};
use std::net::Ipv4Addr;

pub type ApiResult<T> = std::result::Result<T, ExternalServiceError>;

/// Remote operations on one gateway appliance.
///
/// Calls are blocking and issued one at a time; implementations need not be
/// thread safe.
pub trait GatewayApi {
    fn fetch_gateway(&mut self, gateway_id: &str) -> ApiResult<GatewayDescriptor>;

    /// Write the interface table and deployment flag back.
    fn write_gateway(&mut self, gateway: &GatewayDescriptor) -> ApiResult<()>;

    /// Returns the id the service assigned to the new pool.
    fn add_pool_entry(
        &mut self,
        gateway_id: &str,
        range: &IpRange,
        default_gateway: Ipv4Addr,
        netmask: Ipv4Addr,
    ) -> ApiResult<String>;

    fn delete_pool_entry(&mut self, gateway_id: &str, pool_id: &str) -> ApiResult<()>;

    fn fetch_provisioned_pools(&mut self, gateway_id: &str) -> ApiResult<Vec<ProvisionedPool>>;
}
