//! Logical network assignments: which subnets ride on which logical network.

use super::{Ipv4, Subnet, SubnetSpec};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One logical network and its subnets, as written in the desired configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct LogicalNetworkSpec {
    /// Logical network / port group identifier.
    pub id: String,
    #[serde(default)]
    pub subnets: Vec<SubnetSpec>,
}

/// Desired DHCP configuration for one gateway appliance.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct DhcpServiceSpec {
    pub gateway_id: String,
    #[serde(default)]
    pub logical_networks: Vec<LogicalNetworkSpec>,
}

impl DhcpServiceSpec {
    /// The same gateway with nothing attached, the target of a delete.
    pub fn empty_for(&self) -> DhcpServiceSpec {
        DhcpServiceSpec {
            gateway_id: self.gateway_id.clone(),
            logical_networks: vec![],
        }
    }
}

/// A logical network attached to a gateway interface with its resolved subnets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalNetworkAssignment {
    pub logical_network_id: String,
    /// Keyed by normalised CIDR.
    pub subnets: BTreeMap<Ipv4, Subnet>,
}

impl LogicalNetworkAssignment {
    pub fn new(logical_network_id: &str) -> LogicalNetworkAssignment {
        LogicalNetworkAssignment {
            logical_network_id: logical_network_id.to_string(),
            subnets: BTreeMap::new(),
        }
    }

    pub fn with_subnets(logical_network_id: &str, subnets: Vec<Subnet>) -> LogicalNetworkAssignment {
        let mut assignment = LogicalNetworkAssignment::new(logical_network_id);
        for subnet in subnets {
            assignment.subnets.insert(subnet.cidr, subnet);
        }
        assignment
    }

    pub fn subnet_list(&self) -> Vec<Subnet> {
        self.subnets.values().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.subnets.is_empty()
    }
}

impl fmt::Display for LogicalNetworkAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cidrs: Vec<String> = self.subnets.keys().map(|c| c.to_string()).collect();
        write!(f, "{} [{}]", self.logical_network_id, cidrs.join(", "))
    }
}

/// Assignments keyed by logical network id.
pub type AssignmentSet = BTreeMap<String, LogicalNetworkAssignment>;
