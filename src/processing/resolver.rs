//! Subnet resolution: validate raw DHCP input and derive gateway, interface
//! address and pool ranges.
//!
//! Derivation rule, applied the same way whichever inputs are omitted:
//! 1. the gateway is the explicit one, or else the first address of the
//!    lowest explicit pool range, or else the first usable address;
//! 2. the gateway is removed from the candidate pool;
//! 3. the first remaining address of the lowest pool range becomes the
//!    interface address and is removed from the pool as well.

use crate::error::{Error, Result};
use crate::models::{
    exclude_address, parse_range_endpoints, ranges_overlap, AssignmentSet, DhcpServiceSpec,
    IpRange, Ipv4, LogicalNetworkAssignment, Subnet, SubnetSpec,
};
use std::net::Ipv4Addr;
use std::str::FromStr;

/// Parse a CIDR string such as "10.1.2.0/24".
pub fn validate_cidr(cidr: &str) -> Result<Ipv4> {
    Ipv4::new(cidr)
}

/// Parse a bare dot-decimal address.
pub fn validate_ip(addr: &str) -> Result<Ipv4Addr> {
    Ipv4Addr::from_str(addr.trim()).map_err(|_| Error::InvalidAddress {
        addr: addr.to_string(),
    })
}

/// Parse a pool range; start must be strictly below end.
pub fn validate_ip_range(range: &str) -> Result<IpRange> {
    let (start, end) = parse_range_endpoints(range)?;
    if start >= end {
        return Err(Error::RangeInverted {
            range: range.to_string(),
        });
    }
    Ok(IpRange { start, end })
}

/// Reject any pair of intersecting ranges, then sort ascending by start.
pub fn validate_and_sort_ranges(mut ranges: Vec<IpRange>) -> Result<Vec<IpRange>> {
    for (i, first) in ranges.iter().enumerate() {
        for second in ranges.iter().skip(i + 1) {
            if ranges_overlap(first, second) {
                return Err(Error::OverlappingRanges {
                    first: first.to_string(),
                    second: second.to_string(),
                });
            }
        }
    }
    ranges.sort_by_key(|r| r.start);
    Ok(ranges)
}

/// Parse explicit pool ranges of one subnet against its usable host range.
///
/// Containment is reported before orientation, so the endpoints are read
/// once here and the range is then handed to [`validate_ip_range`].
fn resolve_pool(usable: &IpRange, cidr_text: &str, ip_pool: &[String]) -> Result<Vec<IpRange>> {
    let mut ranges = Vec::with_capacity(ip_pool.len());
    for text in ip_pool {
        let (start, end) = parse_range_endpoints(text)?;
        if !usable.contains(start) || !usable.contains(end) {
            return Err(Error::RangeOutsideCidr {
                range: text.to_string(),
                cidr: cidr_text.to_string(),
            });
        }
        ranges.push(validate_ip_range(text)?);
    }
    validate_and_sort_ranges(ranges)
}

/// Drop `addr` from whichever range holds it, keeping the list sorted.
fn carve_out(ranges: Vec<IpRange>, addr: Ipv4Addr) -> Vec<IpRange> {
    ranges
        .into_iter()
        .flat_map(|r| exclude_address(r, addr))
        .collect()
}

/// Resolve one subnet from its raw settings.
pub fn resolve_subnet(spec: &SubnetSpec) -> Result<Subnet> {
    let cidr = validate_cidr(&spec.cidr)?.network();
    // /31 and /32 fail here, before any range math
    let usable = cidr.usable_range().map_err(|_| Error::InvalidCidr {
        cidr: spec.cidr.clone(),
        reason: format!("prefix /{} leaves no usable host range for DHCP", cidr.mask),
    })?;

    let explicit_pool = if spec.ip_pool.is_empty() {
        None
    } else {
        Some(resolve_pool(&usable, &spec.cidr, &spec.ip_pool)?)
    };

    let explicit_gateway = match spec.default_gw.as_deref().map(str::trim) {
        Some(gw) if !gw.is_empty() => {
            let addr = validate_ip(gw)?;
            if !usable.contains(addr) {
                return Err(Error::GatewayOutsideCidr {
                    gateway: gw.to_string(),
                    cidr: spec.cidr.clone(),
                });
            }
            if let Some(range) = explicit_pool
                .iter()
                .flatten()
                .find(|r| r.contains(addr))
            {
                return Err(Error::GatewayInsidePool {
                    gateway: gw.to_string(),
                    range: range.to_string(),
                });
            }
            Some(addr)
        }
        _ => None,
    };

    let (default_gateway, pool) = match (explicit_gateway, explicit_pool) {
        (Some(gateway), Some(pool)) => (gateway, pool),
        (Some(gateway), None) => (gateway, exclude_address(usable, gateway)),
        (None, Some(pool)) => {
            let gateway = pool[0].start;
            (gateway, carve_out(pool, gateway))
        }
        (None, None) => (usable.start, exclude_address(usable, usable.start)),
    };

    let interface_address = pool.first().map(|r| r.start).ok_or_else(|| Error::InvalidCidr {
        cidr: spec.cidr.clone(),
        reason: "no address left for the gateway interface".to_string(),
    })?;
    let pool_ranges = carve_out(pool, interface_address);

    Ok(Subnet {
        cidr,
        network_address: cidr.lo(),
        netmask: cidr.netmask(),
        default_gateway,
        interface_address,
        pool_ranges,
    })
}

/// No two subnets on one gateway may share an address.
fn check_disjoint(seen: &[(String, Ipv4)], id: &str, cidr: &Ipv4, cidr_text: &str) -> Result<()> {
    let block = |c: &Ipv4| IpRange {
        start: c.lo(),
        end: c.hi(),
    };
    for (other_id, other) in seen {
        if other == cidr {
            return Err(Error::DuplicateSubnet {
                logical_network: id.to_string(),
                cidr: cidr_text.to_string(),
            });
        }
        if ranges_overlap(&block(other), &block(cidr)) {
            return Err(Error::OverlappingRanges {
                first: format!("{other} ({other_id})"),
                second: format!("{cidr} ({id})"),
            });
        }
    }
    Ok(())
}

/// Resolve a whole service spec into assignments keyed by logical network.
///
/// Entries sharing a logical network id are merged. Subnets must not
/// intersect anywhere on the gateway, whichever logical network they sit on.
pub fn resolve_assignments(spec: &DhcpServiceSpec) -> Result<AssignmentSet> {
    if spec.gateway_id.trim().is_empty() {
        return Err(Error::Config("gateway_id must not be empty".to_string()));
    }
    let mut assignments = AssignmentSet::new();
    // every subnet resolved so far, across all logical networks
    let mut seen: Vec<(String, Ipv4)> = Vec::new();
    for network in &spec.logical_networks {
        let id = network.id.trim();
        if id.is_empty() {
            return Err(Error::Config(
                "logical network id must not be empty".to_string(),
            ));
        }
        if network.subnets.is_empty() {
            return Err(Error::Config(format!(
                "logical network '{id}' has no subnets"
            )));
        }
        let assignment = assignments
            .entry(id.to_string())
            .or_insert_with(|| LogicalNetworkAssignment::new(id));
        for subnet_spec in &network.subnets {
            let subnet = resolve_subnet(subnet_spec)?;
            check_disjoint(&seen, id, &subnet.cidr, &subnet_spec.cidr)?;
            seen.push((id.to_string(), subnet.cidr));
            log::debug!("resolved {id}: {subnet}");
            assignment.subnets.insert(subnet.cidr, subnet);
        }
    }
    Ok(assignments)
}
