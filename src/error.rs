//! Error taxonomy for subnet resolution, slot allocation and gateway sync.
//!
//! Every variant carries the offending input so it renders as a single
//! actionable message.

use thiserror::Error;

/// Failure reported by the remote gateway-management service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExternalServiceError {
    #[error("{operation}: not found ({detail})")]
    NotFound { operation: String, detail: String },
    #[error("{operation}: service unavailable ({detail})")]
    Unavailable { operation: String, detail: String },
    #[error("{operation}: conflicting update ({detail})")]
    Conflict { operation: String, detail: String },
    #[error("{operation}: rejected as invalid ({detail})")]
    Invalid { operation: String, detail: String },
}

impl ExternalServiceError {
    /// Map an HTTP status code to the matching error kind.
    pub fn from_status(operation: &str, status: u16, detail: String) -> Self {
        let operation = operation.to_string();
        match status {
            404 => ExternalServiceError::NotFound { operation, detail },
            409 => ExternalServiceError::Conflict { operation, detail },
            400 | 422 => ExternalServiceError::Invalid { operation, detail },
            _ => ExternalServiceError::Unavailable {
                operation,
                detail: format!("HTTP {status}: {detail}"),
            },
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("CIDR '{cidr}' is not valid: {reason}")]
    InvalidCidr { cidr: String, reason: String },

    #[error("IP '{addr}' is not a valid IPv4 address")]
    InvalidAddress { addr: String },

    #[error("IP range '{range}' is not valid, expected '<start>-<end>' in dot-decimal")]
    InvalidRangeFormat { range: String },

    #[error("Start IP needs to be smaller than End IP in the range '{range}'")]
    RangeInverted { range: String },

    #[error("IP range '{range}' does not belong to the usable hosts of CIDR {cidr}")]
    RangeOutsideCidr { range: String, cidr: String },

    #[error("Overlapping IP ranges '{first}' and '{second}'")]
    OverlappingRanges { first: String, second: String },

    #[error("Default gateway '{gateway}' does not belong to the usable hosts of CIDR {cidr}")]
    GatewayOutsideCidr { gateway: String, cidr: String },

    #[error("Default gateway '{gateway}' is part of IP range {range}")]
    GatewayInsidePool { gateway: String, range: String },

    #[error("CIDR {cidr} is listed more than once, again under logical network '{logical_network}'")]
    DuplicateSubnet {
        logical_network: String,
        cidr: String,
    },

    #[error("No free interface slot for logical network '{logical_network}', all {capacity} slots are connected")]
    NoFreeInterfaceSlot {
        logical_network: String,
        capacity: usize,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    External(#[from] ExternalServiceError),
}

impl Error {
    /// True for errors raised before any external call was made.
    pub fn is_validation(&self) -> bool {
        !matches!(self, Error::External(_) | Error::Config(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let e = ExternalServiceError::from_status("fetch gateway", 404, "edge-7".to_string());
        assert!(matches!(e, ExternalServiceError::NotFound { .. }));
        let e = ExternalServiceError::from_status("write gateway", 409, "stale".to_string());
        assert!(matches!(e, ExternalServiceError::Conflict { .. }));
        let e = ExternalServiceError::from_status("add pool", 400, "bad range".to_string());
        assert!(matches!(e, ExternalServiceError::Invalid { .. }));
        let e = ExternalServiceError::from_status("add pool", 503, "busy".to_string());
        assert_eq!(
            e.to_string(),
            "add pool: service unavailable (HTTP 503: busy)"
        );
    }

    #[test]
    fn test_messages_name_offending_input() {
        let e = Error::GatewayInsidePool {
            gateway: "1.2.3.10".to_string(),
            range: "1.2.3.5-1.2.3.50".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "Default gateway '1.2.3.10' is part of IP range 1.2.3.5-1.2.3.50"
        );
        assert!(e.is_validation());
        let ext: Error = ExternalServiceError::Unavailable {
            operation: "fetch gateway".to_string(),
            detail: "timeout".to_string(),
        }
        .into();
        assert!(!ext.is_validation());
    }
}
