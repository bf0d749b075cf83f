//! Gateway appliance descriptor: interface slots and provisioned DHCP pools.

use super::{to_int, IpRange, Ipv4};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// A gateway's presence on one subnet.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AddressGroup {
    pub primary_address: Ipv4Addr,
    pub subnet_mask: Ipv4Addr,
}

impl AddressGroup {
    /// Whether this group is the gateway's presence on `cidr`: address
    /// inside the block and the same mask.
    pub fn serves(&self, cidr: &Ipv4) -> bool {
        self.subnet_mask == cidr.netmask() && cidr.contains(self.primary_address)
    }

    /// The block this group sits on, from its address and mask.
    pub fn network(&self) -> Ipv4 {
        Ipv4 {
            addr: self.primary_address,
            mask: to_int(self.subnet_mask).count_ones() as u8,
        }
        .network()
    }
}

/// One attachment point (vNIC) on the gateway.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceSlot {
    pub index: usize,
    /// Logical network (port group) this slot is bound to.
    #[serde(default, rename = "portgroupId")]
    pub logical_network_id: Option<String>,
    #[serde(default)]
    pub address_groups: Vec<AddressGroup>,
    #[serde(default)]
    pub is_connected: bool,
}

impl InterfaceSlot {
    pub fn empty(index: usize) -> InterfaceSlot {
        InterfaceSlot {
            index,
            logical_network_id: None,
            address_groups: vec![],
            is_connected: false,
        }
    }

    pub fn is_bound_to(&self, logical_network_id: &str) -> bool {
        self.logical_network_id.as_deref() == Some(logical_network_id)
    }

    /// Release the slot back to the free list.
    pub fn clear(&mut self) {
        self.logical_network_id = None;
        self.address_groups.clear();
        self.is_connected = false;
    }
}

/// A DHCP pool entry as tracked by the remote service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionedPool {
    /// Opaque identifier assigned by the service.
    pub pool_id: String,
    pub ip_range: IpRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_gateway: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_mask: Option<Ipv4Addr>,
}

/// The gateway appliance as fetched from, and written back to, the service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GatewayDescriptor {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(default)]
    pub appliances_deployed: bool,
    #[serde(default, rename = "vnics")]
    pub slots: Vec<InterfaceSlot>,
    /// Pool entries, fetched separately from the DHCP service.
    #[serde(skip)]
    pub pools: Vec<ProvisionedPool>,
}

impl GatewayDescriptor {
    /// A gateway with `capacity` empty slots and no pools.
    pub fn new(id: &str, capacity: usize) -> GatewayDescriptor {
        GatewayDescriptor {
            id: id.to_string(),
            tenant: None,
            appliances_deployed: false,
            slots: (0..capacity).map(InterfaceSlot::empty).collect(),
            pools: vec![],
        }
    }

    /// Pad to exactly `capacity` slots, ordered by index.
    pub fn normalize_slots(&mut self, capacity: usize) {
        self.slots.sort_by_key(|s| s.index);
        self.slots.dedup_by_key(|s| s.index);
        self.slots.retain(|s| s.index < capacity);
        for index in 0..capacity {
            if !self.slots.iter().any(|s| s.index == index) {
                self.slots.push(InterfaceSlot::empty(index));
            }
        }
        self.slots.sort_by_key(|s| s.index);
    }

    pub fn any_connected(&self) -> bool {
        self.slots.iter().any(|s| s.is_connected)
    }

    pub fn slot_for(&self, logical_network_id: &str) -> Option<&InterfaceSlot> {
        self.slots.iter().find(|s| s.is_bound_to(logical_network_id))
    }

    /// Provisioned pool whose range text equals `range`.
    pub fn pool_for_range(&self, range: &IpRange) -> Option<&ProvisionedPool> {
        let wanted = range.to_string();
        self.pools.iter().find(|p| p.ip_range.to_string() == wanted)
    }
}

impl fmt::Display for GatewayDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let connected = self.slots.iter().filter(|s| s.is_connected).count();
        write!(
            f,
            "{} ({}/{} slots connected, {} pools, deployed={})",
            self.id,
            connected,
            self.slots.len(),
            self.pools.len(),
            self.appliances_deployed
        )
    }
}
