//! Execute a reconcile plan against a gateway.
//!
//! A pass fetches the gateway once, applies every slot change in memory,
//! then issues the remote calls in a fixed order:
//!
//! 1. pool deletes
//! 2. one gateway write, if the interface table changed
//! 3. pool adds
//!
//! Validation and slot exhaustion are raised before the first mutating call.
//! A remote failure stops the pass; earlier calls are not undone, the next
//! pass starts again from the fetched state.

use super::reconcile::{plan, PoolEntry, ReconcilePlan};
use super::resolver::resolve_assignments;
use super::slots::SlotAllocator;
use crate::error::{Error, Result};
use crate::gateway::{ApiResult, GatewayApi};
use crate::models::{AddressGroup, DhcpServiceSpec, IpRange, ProvisionedPool};
use std::fmt;

/// What a pass actually did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub gateway_written: bool,
    pub slots_claimed: Vec<usize>,
    pub slots_released: Vec<usize>,
    /// Pool ids deleted.
    pub pools_deleted: Vec<String>,
    /// Ranges whose pool was already gone.
    pub pools_skipped: Vec<IpRange>,
    /// Ranges left alone on add because a pool already covers them.
    pub pools_present: Vec<IpRange>,
    /// Ranges added, with the id the service assigned.
    pub pools_added: Vec<(IpRange, String)>,
}

impl SyncReport {
    pub fn external_changes(&self) -> usize {
        usize::from(self.gateway_written) + self.pools_deleted.len() + self.pools_added.len()
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "gateway written: {}, slots claimed {:?} released {:?}, pools deleted {} skipped {} present {} added {}",
            self.gateway_written,
            self.slots_claimed,
            self.slots_released,
            self.pools_deleted.len(),
            self.pools_skipped.len(),
            self.pools_present.len(),
            self.pools_added.len()
        )
    }
}

/// A connected interface slot with the pools living on its subnets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedSlot {
    pub index: usize,
    pub logical_network_id: Option<String>,
    pub address_groups: Vec<AddressGroup>,
    pub pools: Vec<ProvisionedPool>,
}

/// Gateway configuration as currently provisioned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedState {
    pub gateway_id: String,
    pub appliances_deployed: bool,
    pub slots: Vec<ObservedSlot>,
    /// Pools inside none of the connected subnets.
    pub unowned_pools: Vec<ProvisionedPool>,
}

fn logged<T>(operation: &str, result: ApiResult<T>) -> Result<T> {
    result.map_err(|e| {
        log::error!("{operation} failed: {e}");
        Error::from(e)
    })
}

/// Resolve both configurations and diff them. Makes no remote call.
pub fn plan_specs(previous: &DhcpServiceSpec, desired: &DhcpServiceSpec) -> Result<ReconcilePlan> {
    if previous.gateway_id != desired.gateway_id {
        return Err(Error::Config(format!(
            "previous configuration targets gateway '{}', desired targets '{}'",
            previous.gateway_id, desired.gateway_id
        )));
    }
    let previous = resolve_assignments(previous)?;
    let desired = resolve_assignments(desired)?;
    Ok(plan(&previous, &desired))
}

/// Keeps one gateway's DHCP configuration in line with the desired one.
pub struct GatewayConfigSync<A: GatewayApi> {
    api: A,
    allocator: SlotAllocator,
}

impl<A: GatewayApi> GatewayConfigSync<A> {
    pub fn new(api: A, allocator: SlotAllocator) -> Self {
        GatewayConfigSync { api, allocator }
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn into_api(self) -> A {
        self.api
    }

    pub fn plan(&self, previous: &DhcpServiceSpec, desired: &DhcpServiceSpec) -> Result<ReconcilePlan> {
        plan_specs(previous, desired)
    }

    /// Provision `desired` on a gateway that carries none of it yet.
    pub fn create(&mut self, desired: &DhcpServiceSpec) -> Result<SyncReport> {
        self.update(&desired.empty_for(), desired)
    }

    pub fn update(&mut self, previous: &DhcpServiceSpec, desired: &DhcpServiceSpec) -> Result<SyncReport> {
        let plan = self.plan(previous, desired)?;
        self.apply(&desired.gateway_id, &plan)
    }

    /// Remove everything `previous` provisioned.
    pub fn delete(&mut self, previous: &DhcpServiceSpec) -> Result<SyncReport> {
        self.update(previous, &previous.empty_for())
    }

    /// Run `plan` against `gateway_id`.
    pub fn apply(&mut self, gateway_id: &str, plan: &ReconcilePlan) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        if plan.is_empty() {
            log::info!("gateway {gateway_id}: configuration unchanged, nothing to do");
            return Ok(report);
        }
        log::info!("gateway {gateway_id}: applying {plan}");

        let mut gateway = logged("fetch gateway", self.api.fetch_gateway(gateway_id))?;
        if !plan.pool_deletes.is_empty() || !plan.pool_adds.is_empty() {
            gateway.pools = logged(
                "fetch provisioned pools",
                self.api.fetch_provisioned_pools(gateway_id),
            )?;
        }

        if plan.touches_slots() {
            self.allocator.prepare(&mut gateway);
            let before = gateway.clone();
            for assignment in &plan.detach {
                let outcome = self.allocator.detach(
                    &mut gateway,
                    &assignment.logical_network_id,
                    &assignment.subnet_list(),
                );
                if outcome.released {
                    report.slots_released.extend(outcome.slot_index);
                }
                if outcome.gateway_idle {
                    gateway.appliances_deployed = false;
                }
            }
            for assignment in &plan.attach {
                let outcome = self.allocator.attach(
                    &mut gateway,
                    &assignment.logical_network_id,
                    &assignment.subnet_list(),
                )?;
                if outcome.claimed {
                    report.slots_claimed.push(outcome.slot_index);
                }
            }
            report.gateway_written = gateway != before;
        }

        for entry in &plan.pool_deletes {
            self.delete_pool(&mut gateway.pools, gateway_id, entry, &mut report)?;
        }

        if report.gateway_written {
            log::info!("gateway {gateway_id}: writing interface table ({gateway})");
            logged("write gateway", self.api.write_gateway(&gateway))?;
        }

        for entry in &plan.pool_adds {
            if let Some(existing) = gateway.pool_for_range(&entry.range) {
                log::warn!(
                    "gateway {gateway_id}: pool {} already provisioned as {}, skipping add",
                    entry.range,
                    existing.pool_id
                );
                report.pools_present.push(entry.range);
                continue;
            }
            log::info!("gateway {gateway_id}: adding pool {entry}");
            let pool_id = logged(
                "add pool entry",
                self.api.add_pool_entry(
                    gateway_id,
                    &entry.range,
                    entry.default_gateway,
                    entry.netmask,
                ),
            )?;
            gateway.pools.push(ProvisionedPool {
                pool_id: pool_id.clone(),
                ip_range: entry.range,
                default_gateway: Some(entry.default_gateway),
                subnet_mask: Some(entry.netmask),
            });
            report.pools_added.push((entry.range, pool_id));
        }

        log::info!("gateway {gateway_id}: done, {report}");
        Ok(report)
    }

    fn delete_pool(
        &mut self,
        provisioned: &mut Vec<ProvisionedPool>,
        gateway_id: &str,
        entry: &PoolEntry,
        report: &mut SyncReport,
    ) -> Result<()> {
        // provisioned pools are matched on their range text only
        let wanted = entry.range.to_string();
        let Some(pos) = provisioned
            .iter()
            .position(|p| p.ip_range.to_string() == wanted)
        else {
            log::warn!("gateway {gateway_id}: pool {wanted} already absent, skipping delete");
            report.pools_skipped.push(entry.range);
            return Ok(());
        };
        let pool = provisioned.remove(pos);
        log::info!("gateway {gateway_id}: deleting pool {} ({entry})", pool.pool_id);
        logged(
            "delete pool entry",
            self.api.delete_pool_entry(gateway_id, &pool.pool_id),
        )?;
        report.pools_deleted.push(pool.pool_id);
        Ok(())
    }

    /// Fetch the gateway and group its pools under the connected slots.
    pub fn read(&mut self, gateway_id: &str) -> Result<ObservedState> {
        let mut gateway = logged("fetch gateway", self.api.fetch_gateway(gateway_id))?;
        self.allocator.prepare(&mut gateway);
        let mut unowned = logged(
            "fetch provisioned pools",
            self.api.fetch_provisioned_pools(gateway_id),
        )?;

        let mut slots = Vec::new();
        for slot in gateway.slots.iter().filter(|s| s.is_connected) {
            let networks: Vec<_> = slot.address_groups.iter().map(|g| g.network()).collect();
            let (mine, rest): (Vec<_>, Vec<_>) = unowned
                .into_iter()
                .partition(|p| networks.iter().any(|n| n.contains_range(&p.ip_range)));
            unowned = rest;
            slots.push(ObservedSlot {
                index: slot.index,
                logical_network_id: slot.logical_network_id.clone(),
                address_groups: slot.address_groups.clone(),
                pools: mine,
            });
        }
        if !unowned.is_empty() {
            log::warn!(
                "gateway {gateway_id}: {} pool(s) outside every connected subnet",
                unowned.len()
            );
        }

        Ok(ObservedState {
            gateway_id: gateway.id,
            appliances_deployed: gateway.appliances_deployed,
            slots,
            unowned_pools: unowned,
        })
    }
}
