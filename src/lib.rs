//! Address-space allocation and reconciliation for gateway DHCP services.
//!
//! Resolves raw subnet settings into gateway, interface address and DHCP
//! pools, maps logical networks onto a gateway's interface slots and keeps
//! the remote configuration in line with the desired one.

pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod output;
pub mod processing;

pub use error::{Error, ExternalServiceError, Result};
