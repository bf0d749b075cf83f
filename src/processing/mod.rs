//! Subnet resolution and gateway reconciliation logic.
//!
//! - [`resolver`] - turn raw subnet specs into gateway, interface address and pools
//! - [`slots`] - bind logical networks to interface slots
//! - [`reconcile`] - diff two configurations into a plan
//! - [`sync`] - run a plan against a gateway

mod reconcile;
mod resolver;
mod slots;
mod sync;

// Re-export public functions
pub use reconcile::{plan, PoolEntry, ReconcilePlan};
pub use resolver::{
    resolve_assignments, resolve_subnet, validate_and_sort_ranges, validate_cidr, validate_ip,
    validate_ip_range,
};
pub use slots::{AttachOutcome, DetachOutcome, SlotAllocator};
pub use sync::{plan_specs, GatewayConfigSync, ObservedSlot, ObservedState, SyncReport};
