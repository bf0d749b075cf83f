//! Diff previous against desired assignments into slot and pool operations.
//!
//! Planning is pure: it makes no external call, so an unchanged
//! configuration yields an empty plan and the sync layer never touches the
//! gateway.

use crate::models::{AssignmentSet, IpRange, Ipv4, LogicalNetworkAssignment, Subnet};
use itertools::Itertools;
use std::collections::BTreeSet;
use std::fmt;
use std::net::Ipv4Addr;

/// One DHCP pool entry to add or delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PoolEntry {
    pub logical_network_id: String,
    pub cidr: Ipv4,
    pub range: IpRange,
    pub default_gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

impl PoolEntry {
    /// Entries for every pool range of `subnet`.
    pub fn for_subnet(logical_network_id: &str, subnet: &Subnet) -> Vec<PoolEntry> {
        subnet
            .pool_ranges
            .iter()
            .map(|range| PoolEntry {
                logical_network_id: logical_network_id.to_string(),
                cidr: subnet.cidr,
                range: *range,
                default_gateway: subnet.default_gateway,
                netmask: subnet.netmask,
            })
            .collect()
    }

    /// Identity as the DHCP backend sees it.
    fn backend_key(&self) -> (IpRange, Ipv4Addr, Ipv4Addr) {
        (self.range, self.default_gateway, self.netmask)
    }
}

impl fmt::Display for PoolEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} gw={} mask={} ({} on {})",
            self.range, self.default_gateway, self.netmask, self.cidr, self.logical_network_id
        )
    }
}

/// The operations that move the gateway from one configuration to another.
///
/// Executed as: pool deletes, then slot detaches and attaches (one gateway
/// write), then pool adds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcilePlan {
    /// Address groups to drop, grouped by logical network.
    pub detach: Vec<LogicalNetworkAssignment>,
    /// Address groups to add, grouped by logical network.
    pub attach: Vec<LogicalNetworkAssignment>,
    pub pool_deletes: Vec<PoolEntry>,
    pub pool_adds: Vec<PoolEntry>,
    /// Subnets present and identical on both sides.
    pub unchanged: usize,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.detach.is_empty()
            && self.attach.is_empty()
            && self.pool_deletes.is_empty()
            && self.pool_adds.is_empty()
    }

    pub fn touches_slots(&self) -> bool {
        !self.detach.is_empty() || !self.attach.is_empty()
    }
}

impl fmt::Display for ReconcilePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "detach {} / attach {} logical network(s), delete {} / add {} pool(s), {} unchanged subnet(s)",
            self.detach.len(),
            self.attach.len(),
            self.pool_deletes.len(),
            self.pool_adds.len(),
            self.unchanged
        )
    }
}

/// How a subnet present on both sides changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubnetDelta {
    Unchanged,
    /// Gateway or pools differ; the slot's address group stays.
    PoolsOnly,
    /// Interface address or mask differs; the address group is replaced.
    Interface,
}

fn subnet_delta(old: &Subnet, new: &Subnet) -> SubnetDelta {
    if old == new {
        SubnetDelta::Unchanged
    } else if old.same_interface(new) {
        SubnetDelta::PoolsOnly
    } else {
        SubnetDelta::Interface
    }
}

/// Compute the plan taking `previous` to `desired`.
pub fn plan(previous: &AssignmentSet, desired: &AssignmentSet) -> ReconcilePlan {
    let mut result = ReconcilePlan::default();

    let previous_ids: BTreeSet<&String> = previous.keys().collect();
    let desired_ids: BTreeSet<&String> = desired.keys().collect();

    for id in previous_ids.difference(&desired_ids) {
        let gone = &previous[*id];
        log::debug!("plan: logical network {gone} removed");
        for subnet in gone.subnets.values() {
            result.pool_deletes.extend(PoolEntry::for_subnet(id, subnet));
        }
        result.detach.push(gone.clone());
    }

    for id in previous_ids.intersection(&desired_ids) {
        let old = &previous[*id];
        let new = &desired[*id];
        let mut detach = LogicalNetworkAssignment::new(id);
        let mut attach = LogicalNetworkAssignment::new(id);
        let mut old_pools = Vec::new();
        let mut new_pools = Vec::new();

        for (cidr, old_subnet) in &old.subnets {
            match new.subnets.get(cidr) {
                None => {
                    detach.subnets.insert(*cidr, old_subnet.clone());
                    old_pools.extend(PoolEntry::for_subnet(id, old_subnet));
                }
                Some(new_subnet) => match subnet_delta(old_subnet, new_subnet) {
                    SubnetDelta::Unchanged => result.unchanged += 1,
                    SubnetDelta::PoolsOnly => {
                        log::debug!("plan: {id} {cidr} pools modified in place");
                        old_pools.extend(PoolEntry::for_subnet(id, old_subnet));
                        new_pools.extend(PoolEntry::for_subnet(id, new_subnet));
                    }
                    SubnetDelta::Interface => {
                        log::debug!("plan: {id} {cidr} interface address changed");
                        detach.subnets.insert(*cidr, old_subnet.clone());
                        attach.subnets.insert(*cidr, new_subnet.clone());
                        old_pools.extend(PoolEntry::for_subnet(id, old_subnet));
                        new_pools.extend(PoolEntry::for_subnet(id, new_subnet));
                    }
                },
            }
        }
        for (cidr, new_subnet) in &new.subnets {
            if !old.subnets.contains_key(cidr) {
                attach.subnets.insert(*cidr, new_subnet.clone());
                new_pools.extend(PoolEntry::for_subnet(id, new_subnet));
            }
        }

        // Pool entries identical on both sides need no call.
        let kept: BTreeSet<_> = old_pools
            .iter()
            .map(PoolEntry::backend_key)
            .filter(|k| new_pools.iter().any(|p| p.backend_key() == *k))
            .collect();
        result.pool_deletes.extend(
            old_pools
                .into_iter()
                .filter(|p| !kept.contains(&p.backend_key())),
        );
        result.pool_adds.extend(
            new_pools
                .into_iter()
                .filter(|p| !kept.contains(&p.backend_key())),
        );

        if !detach.is_empty() {
            result.detach.push(detach);
        }
        if !attach.is_empty() {
            result.attach.push(attach);
        }
    }

    for id in desired_ids.difference(&previous_ids) {
        let added = &desired[*id];
        log::debug!("plan: logical network {added} added");
        for subnet in added.subnets.values() {
            result.pool_adds.extend(PoolEntry::for_subnet(id, subnet));
        }
        result.attach.push(added.clone());
    }

    log::info!("plan: {result}");
    if !result.pool_deletes.is_empty() {
        log::debug!(
            "plan: pool deletes {}",
            result.pool_deletes.iter().map(|p| p.range).join(", ")
        );
    }
    result
}
