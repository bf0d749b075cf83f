//! Terminal output of plans, sync reports and observed gateway state.

use crate::models::AddressGroup;
use crate::processing::{ObservedState, ReconcilePlan, SyncReport};
use colored::Colorize;
use itertools::Itertools;

/// Left-aligned field padded to `width`, never truncated.
pub fn format_field<T: ToString>(value: T, width: usize) -> String {
    let value_str = value.to_string();
    format!("{value_str:<width$}")
}

fn groups_text(groups: &[AddressGroup]) -> String {
    groups
        .iter()
        .map(|g| format!("{}/{}", g.primary_address, g.subnet_mask))
        .join(",")
}

/// One line per operation, `-` for removals and `+` for additions.
pub fn plan_lines(gateway_id: &str, plan: &ReconcilePlan) -> Vec<String> {
    let mut lines = vec![format!("# gateway {gateway_id}: {plan}")];
    if plan.is_empty() {
        lines.push(format!("{}", "No changes.".green()));
        return lines;
    }
    for pool in &plan.pool_deletes {
        lines.push(format!(
            "{} pool      {} {}",
            "-".red(),
            format_field(pool.range, 33),
            pool.logical_network_id
        ));
    }
    for assignment in &plan.detach {
        for subnet in assignment.subnets.values() {
            lines.push(format!(
                "{} interface {} {}",
                "-".red(),
                format_field(subnet.cidr, 33),
                assignment.logical_network_id
            ));
        }
    }
    for assignment in &plan.attach {
        for subnet in assignment.subnets.values() {
            lines.push(format!(
                "{} interface {} {} if={}",
                "+".green(),
                format_field(subnet.cidr, 33),
                assignment.logical_network_id,
                subnet.interface_address
            ));
        }
    }
    for pool in &plan.pool_adds {
        lines.push(format!(
            "{} pool      {} {} gw={}",
            "+".green(),
            format_field(pool.range, 33),
            pool.logical_network_id,
            pool.default_gateway
        ));
    }
    lines
}

pub fn print_plan(gateway_id: &str, plan: &ReconcilePlan) {
    for line in plan_lines(gateway_id, plan) {
        println!("{line}");
    }
}

pub fn print_report(gateway_id: &str, report: &SyncReport) {
    if report.external_changes() == 0
        && report.pools_skipped.is_empty()
        && report.pools_present.is_empty()
    {
        println!("# gateway {gateway_id}: {}", "already up to date".green());
        return;
    }
    println!("# gateway {gateway_id}: {report}");
    for (range, pool_id) in &report.pools_added {
        println!("{} pool {} id={pool_id}", "+".green(), format_field(range, 33));
    }
    for range in &report.pools_skipped {
        println!("{} pool {} already absent", "!".yellow(), format_field(range, 33));
    }
    for range in &report.pools_present {
        println!("{} pool {} already present", "!".yellow(), format_field(range, 33));
    }
}

pub fn observed_lines(state: &ObservedState) -> Vec<String> {
    let mut lines = vec![format!(
        "# gateway {} deployed={} connected slots={}",
        state.gateway_id,
        state.appliances_deployed,
        state.slots.len()
    )];
    for slot in &state.slots {
        lines.push(format!(
            "{} {} {}",
            format_field(format!("vnic{}", slot.index), 7),
            format_field(slot.logical_network_id.as_deref().unwrap_or("-"), 24),
            groups_text(&slot.address_groups)
        ));
        for pool in &slot.pools {
            lines.push(format!(
                "        pool {} id={} gw={} ({} addresses)",
                format_field(pool.ip_range, 33),
                pool.pool_id,
                pool.default_gateway
                    .map(|g| g.to_string())
                    .unwrap_or_else(|| "-".to_string()),
                pool.ip_range.size()
            ));
        }
    }
    for pool in &state.unowned_pools {
        lines.push(format!(
            "{} pool {} id={} outside every connected subnet",
            "!".yellow(),
            format_field(pool.ip_range, 33),
            pool.pool_id
        ));
    }
    lines
}

pub fn print_observed(state: &ObservedState) {
    for line in observed_lines(state) {
        println!("{line}");
    }
}
