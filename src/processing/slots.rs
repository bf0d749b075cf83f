//! Interface slot bookkeeping on a gateway descriptor.
//!
//! A logical network occupies at most one slot; each of its subnets is an
//! address group on that slot.

use crate::error::{Error, Result};
use crate::models::{GatewayDescriptor, Subnet};

/// What an [`SlotAllocator::attach`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachOutcome {
    pub slot_index: usize,
    /// A free slot was claimed rather than an existing one extended.
    pub claimed: bool,
    pub groups_added: usize,
}

impl AttachOutcome {
    pub fn changed(&self) -> bool {
        self.claimed || self.groups_added > 0
    }
}

/// What an [`SlotAllocator::detach`] changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DetachOutcome {
    /// `None` when no slot was bound to the logical network.
    pub slot_index: Option<usize>,
    pub groups_removed: usize,
    /// The slot lost its last address group and was freed.
    pub released: bool,
    /// No slot on the gateway is connected any more; the caller should mark
    /// the appliances as not deployed.
    pub gateway_idle: bool,
}

impl DetachOutcome {
    pub fn changed(&self) -> bool {
        self.groups_removed > 0 || self.released
    }
}

/// Maps logical networks onto a fixed number of interface slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotAllocator {
    capacity: usize,
}

impl SlotAllocator {
    pub fn new(capacity: usize) -> SlotAllocator {
        SlotAllocator { capacity }
    }

    /// Bring `gateway` to exactly `capacity` slots.
    pub fn prepare(&self, gateway: &mut GatewayDescriptor) {
        gateway.normalize_slots(self.capacity);
    }

    /// Attach `subnets` to the slot bound to `logical_network_id`, claiming
    /// the first disconnected slot if there is none.
    ///
    /// A subnet already represented by an address group with its mask and
    /// inside its CIDR is skipped, so repeating an attach is a no-op.
    pub fn attach(
        &self,
        gateway: &mut GatewayDescriptor,
        logical_network_id: &str,
        subnets: &[Subnet],
    ) -> Result<AttachOutcome> {
        let limit = self.capacity.min(gateway.slots.len());
        let slots = &mut gateway.slots[..limit];

        let (slot, claimed) = match slots
            .iter()
            .position(|s| s.is_bound_to(logical_network_id))
        {
            Some(pos) => (&mut slots[pos], false),
            None => {
                let pos = slots.iter().position(|s| !s.is_connected).ok_or_else(|| {
                    Error::NoFreeInterfaceSlot {
                        logical_network: logical_network_id.to_string(),
                        capacity: self.capacity,
                    }
                })?;
                let slot = &mut slots[pos];
                slot.clear();
                slot.logical_network_id = Some(logical_network_id.to_string());
                slot.is_connected = true;
                log::debug!("slot {} claimed by {}", slot.index, logical_network_id);
                (slot, true)
            }
        };

        let mut groups_added = 0;
        for subnet in subnets {
            if slot.address_groups.iter().any(|g| g.serves(&subnet.cidr)) {
                log::debug!(
                    "slot {} already carries {} for {}",
                    slot.index,
                    subnet.cidr,
                    logical_network_id
                );
                continue;
            }
            slot.address_groups.push(subnet.address_group());
            groups_added += 1;
        }
        let slot_index = slot.index;

        if claimed {
            gateway.appliances_deployed = true;
        }
        Ok(AttachOutcome {
            slot_index,
            claimed,
            groups_added,
        })
    }

    /// Remove the address groups of `subnets` from the slot bound to
    /// `logical_network_id`, freeing the slot when nothing is left.
    ///
    /// Detaching a network that holds no slot is tolerated.
    pub fn detach(
        &self,
        gateway: &mut GatewayDescriptor,
        logical_network_id: &str,
        subnets: &[Subnet],
    ) -> DetachOutcome {
        let Some(slot) = gateway
            .slots
            .iter_mut()
            .find(|s| s.is_bound_to(logical_network_id))
        else {
            log::warn!(
                "detach: no interface slot is bound to logical network '{logical_network_id}', nothing to do"
            );
            return DetachOutcome {
                gateway_idle: !gateway.any_connected(),
                ..Default::default()
            };
        };

        let mut groups_removed = 0;
        for subnet in subnets {
            // group order carries no meaning
            if let Some(pos) = slot
                .address_groups
                .iter()
                .position(|g| g.serves(&subnet.cidr))
            {
                slot.address_groups.swap_remove(pos);
                groups_removed += 1;
            } else {
                log::debug!(
                    "slot {} has no address group in {}",
                    slot.index,
                    subnet.cidr
                );
            }
        }

        let slot_index = slot.index;
        let released = slot.address_groups.is_empty();
        if released {
            log::debug!("slot {} released by {}", slot_index, logical_network_id);
            slot.clear();
        }

        DetachOutcome {
            slot_index: Some(slot_index),
            groups_removed,
            released,
            gateway_idle: !gateway.any_connected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_INTERFACE_SLOTS;
    use crate::models::SubnetSpec;
    use crate::processing::resolve_subnet;

    fn subnet(cidr: &str) -> Subnet {
        resolve_subnet(&SubnetSpec::new(cidr)).unwrap()
    }

    fn gateway() -> GatewayDescriptor {
        GatewayDescriptor::new("edge-1", DEFAULT_INTERFACE_SLOTS)
    }

    #[test]
    fn test_attach_claims_first_free_slot() {
        let allocator = SlotAllocator::new(DEFAULT_INTERFACE_SLOTS);
        let mut gw = gateway();
        gw.slots[0].is_connected = true;
        gw.slots[0].logical_network_id = Some("uplink".to_string());

        let out = allocator
            .attach(&mut gw, "ls-a", &[subnet("1.2.3.0/24")])
            .unwrap();
        assert_eq!(out.slot_index, 1);
        assert!(out.claimed);
        assert_eq!(out.groups_added, 1);
        assert!(gw.appliances_deployed);
        let slot = &gw.slots[1];
        assert!(slot.is_connected);
        assert_eq!(slot.address_groups[0].primary_address.to_string(), "1.2.3.2");
        assert_eq!(slot.address_groups[0].subnet_mask.to_string(), "255.255.255.0");
    }

    #[test]
    fn test_attach_merges_into_existing_slot() {
        let allocator = SlotAllocator::new(DEFAULT_INTERFACE_SLOTS);
        let mut gw = gateway();
        allocator
            .attach(&mut gw, "ls-a", &[subnet("1.2.3.0/24")])
            .unwrap();
        let out = allocator
            .attach(&mut gw, "ls-a", &[subnet("1.2.3.0/24"), subnet("4.3.2.0/24")])
            .unwrap();
        assert_eq!(out.slot_index, 0);
        assert!(!out.claimed);
        assert_eq!(out.groups_added, 1);
        assert_eq!(gw.slots[0].address_groups.len(), 2);
        assert!(!gw.slots[1].is_connected);
    }

    #[test]
    fn test_attach_is_idempotent() {
        let allocator = SlotAllocator::new(DEFAULT_INTERFACE_SLOTS);
        let mut gw = gateway();
        allocator
            .attach(&mut gw, "ls-a", &[subnet("1.2.3.0/24")])
            .unwrap();
        let before = gw.clone();
        let out = allocator
            .attach(&mut gw, "ls-a", &[subnet("1.2.3.0/24")])
            .unwrap();
        assert!(!out.changed());
        assert_eq!(gw, before);
    }

    #[test]
    fn test_attach_fails_when_full() {
        let allocator = SlotAllocator::new(DEFAULT_INTERFACE_SLOTS);
        let mut gw = gateway();
        for i in 0..DEFAULT_INTERFACE_SLOTS {
            allocator
                .attach(&mut gw, &format!("ls-{i}"), &[subnet(&format!("10.{i}.0.0/24"))])
                .unwrap();
        }
        let err = allocator
            .attach(&mut gw, "ls-extra", &[subnet("172.16.0.0/24")])
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NoFreeInterfaceSlot { capacity: 10, .. }
        ));
        // an already attached network still gets new subnets
        allocator
            .attach(&mut gw, "ls-3", &[subnet("172.16.0.0/24")])
            .unwrap();
        assert_eq!(gw.slots[3].address_groups.len(), 2);
    }

    #[test]
    fn test_capacity_is_configurable() {
        let allocator = SlotAllocator::new(2);
        let mut gw = GatewayDescriptor::new("edge-1", 0);
        allocator.prepare(&mut gw);
        assert_eq!(gw.slots.len(), 2);
        allocator.attach(&mut gw, "a", &[subnet("10.0.0.0/24")]).unwrap();
        allocator.attach(&mut gw, "b", &[subnet("10.0.1.0/24")]).unwrap();
        assert!(allocator.attach(&mut gw, "c", &[subnet("10.0.2.0/24")]).is_err());
    }

    #[test]
    fn test_detach_partial_then_full() {
        let allocator = SlotAllocator::new(DEFAULT_INTERFACE_SLOTS);
        let mut gw = gateway();
        let a = subnet("1.2.3.0/24");
        let b = subnet("4.3.2.0/24");
        allocator.attach(&mut gw, "ls-a", &[a.clone(), b.clone()]).unwrap();

        let out = allocator.detach(&mut gw, "ls-a", &[a]);
        assert_eq!(out.groups_removed, 1);
        assert!(!out.released);
        assert!(!out.gateway_idle);
        assert_eq!(gw.slots[0].address_groups, vec![b.address_group()]);

        let out = allocator.detach(&mut gw, "ls-a", &[b]);
        assert!(out.released);
        assert!(out.gateway_idle);
        assert!(gw.slots[0].logical_network_id.is_none());
        assert!(!gw.slots[0].is_connected);
    }

    #[test]
    fn test_detach_unknown_network_is_noop() {
        let allocator = SlotAllocator::new(DEFAULT_INTERFACE_SLOTS);
        let mut gw = gateway();
        allocator
            .attach(&mut gw, "ls-a", &[subnet("1.2.3.0/24")])
            .unwrap();
        let before = gw.clone();
        let out = allocator.detach(&mut gw, "ls-missing", &[subnet("1.2.3.0/24")]);
        assert_eq!(out.slot_index, None);
        assert!(!out.changed());
        assert!(!out.gateway_idle);
        assert_eq!(gw, before);
    }

    #[test]
    fn test_freed_slot_is_reused() {
        let allocator = SlotAllocator::new(DEFAULT_INTERFACE_SLOTS);
        let mut gw = gateway();
        let a = subnet("1.2.3.0/24");
        allocator.attach(&mut gw, "ls-a", &[a.clone()]).unwrap();
        allocator.attach(&mut gw, "ls-b", &[subnet("4.3.2.0/24")]).unwrap();
        allocator.detach(&mut gw, "ls-a", &[a]);
        let out = allocator
            .attach(&mut gw, "ls-c", &[subnet("5.5.5.0/24")])
            .unwrap();
        assert_eq!(out.slot_index, 0);
    }

    #[test]
    fn test_nested_subnets_keep_their_own_groups() {
        let allocator = SlotAllocator::new(DEFAULT_INTERFACE_SLOTS);
        let mut gw = gateway();
        let inner = subnet("10.0.1.0/24");
        let outer = subnet("10.0.0.0/16");
        allocator.attach(&mut gw, "ls-a", &[inner.clone()]).unwrap();

        let out = allocator.attach(&mut gw, "ls-a", &[outer.clone()]).unwrap();
        assert_eq!(out.groups_added, 1);
        assert_eq!(gw.slots[0].address_groups.len(), 2);

        let out = allocator.detach(&mut gw, "ls-a", &[outer]);
        assert_eq!(out.groups_removed, 1);
        assert!(!out.released);
        assert_eq!(gw.slots[0].address_groups, vec![inner.address_group()]);
    }
}
