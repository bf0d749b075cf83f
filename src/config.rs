//! Constants and environment-driven client configuration.

use crate::error::{Error, Result};
use std::env;
use std::time::Duration;

/// Interface slots (vNICs) on a gateway appliance.
pub const DEFAULT_INTERFACE_SLOTS: usize = 10;

/// Longest prefix that still leaves two host addresses (gateway + interface).
pub const MAX_USABLE_PREFIX: u8 = 30;

pub const DEFAULT_STATE_FILE: &str = "edge_dhcp_state.json";

pub const DEFAULT_USER_AGENT: &str = "edge-dhcp-sync";

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for the gateway-management service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub manager_uri: String,
    pub user: String,
    pub password: String,
    pub allow_unverified_ssl: bool,
    pub user_agent: String,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Read `GATEWAY_*` variables; call `dotenv` first to pick up a `.env` file.
    pub fn from_env() -> Result<ClientConfig> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup, so tests need not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<ClientConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config(format!("{key} must be set")))
        };
        let manager_uri = required("GATEWAY_MANAGER_URI")?
            .trim_end_matches('/')
            .to_string();
        let user = required("GATEWAY_USER")?;
        let password = required("GATEWAY_PASSWORD")?;

        let allow_unverified_ssl = match lookup("GATEWAY_ALLOW_UNVERIFIED_SSL") {
            Some(v) => parse_bool(&v).ok_or_else(|| {
                Error::Config(format!("GATEWAY_ALLOW_UNVERIFIED_SSL='{v}' is not a boolean"))
            })?,
            None => false,
        };
        let user_agent =
            lookup("GATEWAY_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let timeout_secs = match lookup("GATEWAY_TIMEOUT_SECS") {
            Some(v) => v.trim().parse::<u64>().map_err(|_| {
                Error::Config(format!("GATEWAY_TIMEOUT_SECS='{v}' is not a number"))
            })?,
            None => DEFAULT_TIMEOUT_SECS,
        };

        Ok(ClientConfig {
            manager_uri,
            user,
            password,
            allow_unverified_ssl,
            user_agent,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
