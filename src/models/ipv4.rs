//! IPv4 address, CIDR and address-range arithmetic.
//!
//! Provides [`Ipv4`] for CIDR blocks and [`IpRange`] for inclusive address
//! ranges, along with the integer conversions the range math is built on.

use crate::config::MAX_USABLE_PREFIX;
use crate::error::{Error, Result};
use regex::Regex;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::sync::OnceLock;

/// Maximum length for an IPv4 subnet mask (32 bits).
pub const MAX_LENGTH: u8 = 32;

/// `<a.b.c.d>-<a.b.c.d>`, checked before the endpoints are parsed.
static RANGE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_range_regex() -> &'static Regex {
    RANGE_REGEX.get_or_init(|| {
        Regex::new(r"^\d+\.\d+\.\d+\.\d+-\d+\.\d+\.\d+\.\d+$").expect("Invalid Regex")
    })
}

/// Address as its 32-bit big-endian value.
pub fn to_int(addr: Ipv4Addr) -> u32 {
    u32::from(addr)
}

/// Inverse of [`to_int`].
pub fn from_int(bits: u32) -> Ipv4Addr {
    Ipv4Addr::from(bits)
}

/// Convert a CIDR prefix length to a subnet mask as u32.
///
/// # Examples
/// ```
/// use edge_dhcp_sync::models::get_cidr_mask;
/// assert_eq!(get_cidr_mask(24), Some(0xFFFFFF00));
/// ```
pub fn get_cidr_mask(len: u8) -> Option<u32> {
    if len > MAX_LENGTH {
        None
    } else {
        let right_len = MAX_LENGTH - len;
        let all_bits = u32::MAX as u64;

        let mask = (all_bits >> right_len) << right_len;

        Some(mask as u32)
    }
}

/// Get the network address for a given IP and prefix length.
pub fn cut_addr(addr: Ipv4Addr, len: u8) -> Option<Ipv4Addr> {
    let mask = get_cidr_mask(len)?;
    Some(from_int(to_int(addr) & mask))
}

/// Calculate the broadcast address for a given IP and prefix length.
pub fn broadcast_addr(addr: Ipv4Addr, len: u8) -> Option<Ipv4Addr> {
    let mask = get_cidr_mask(len)?;
    let network_bits = to_int(addr) & mask;
    Some(from_int(network_bits | !mask))
}

/// Usable host range of a CIDR string: network+1 ..= broadcast-1.
///
/// Prefixes longer than /30 leave fewer than two host addresses and are
/// rejected.
pub fn cidr_to_usable_range(cidr: &str) -> Result<IpRange> {
    Ipv4::new(cidr)?.usable_range()
}

/// Split `<start>-<end>` into its two addresses without ordering checks.
pub fn parse_range_endpoints(range: &str) -> Result<(Ipv4Addr, Ipv4Addr)> {
    let trimmed = range.trim();
    if !get_range_regex().is_match(trimmed) {
        return Err(Error::InvalidRangeFormat {
            range: range.to_string(),
        });
    }
    let (start, end) = trimmed
        .split_once('-')
        .ok_or_else(|| Error::InvalidRangeFormat {
            range: range.to_string(),
        })?;
    let parse = |part: &str| {
        Ipv4Addr::from_str(part).map_err(|_| Error::InvalidAddress {
            addr: part.to_string(),
        })
    };
    Ok((parse(start)?, parse(end)?))
}

/// Closed-interval intersection test.
pub fn ranges_overlap(a: &IpRange, b: &IpRange) -> bool {
    a.start <= b.end && b.start <= a.end
}

/// Remove a single address from a range.
///
/// Returns one range when `addr` is an endpoint, two when it is interior and
/// the range unchanged when `addr` lies outside it. A one-address range that
/// equals `addr` leaves nothing.
pub fn exclude_address(range: IpRange, addr: Ipv4Addr) -> Vec<IpRange> {
    if !range.contains(addr) {
        return vec![range];
    }
    if range.start == range.end {
        return vec![];
    }
    let bits = to_int(addr);
    if addr == range.start {
        vec![IpRange {
            start: from_int(bits + 1),
            end: range.end,
        }]
    } else if addr == range.end {
        vec![IpRange {
            start: range.start,
            end: from_int(bits - 1),
        }]
    } else {
        vec![
            IpRange {
                start: range.start,
                end: from_int(bits - 1),
            },
            IpRange {
                start: from_int(bits + 1),
                end: range.end,
            },
        ]
    }
}

/// IPv4 address with CIDR notation support.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct Ipv4 {
    /// The IPv4 address.
    pub addr: Ipv4Addr,
    /// The subnet mask length (0-32).
    pub mask: u8,
}

impl Serialize for Ipv4 {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Ipv4 {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Ipv4, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ipv4::new(&s).map_err(de::Error::custom)
    }
}

impl Ipv4 {
    /// Create a new [`Ipv4`] from a CIDR string (e.g., "10.0.0.0/24").
    pub fn new(addr_cidr: &str) -> Result<Ipv4> {
        let invalid = |reason: &str| Error::InvalidCidr {
            cidr: addr_cidr.to_string(),
            reason: reason.to_string(),
        };
        let trimmed = addr_cidr.trim();
        let parts: Vec<&str> = trimmed.split('/').collect();
        if parts.len() != 2 {
            return Err(invalid("expected <address>/<prefix>"));
        }
        let addr: Ipv4Addr = parts[0]
            .parse()
            .map_err(|_| invalid(&format!("invalid address {}", parts[0])))?;
        let mask: u8 = parts[1]
            .parse()
            .map_err(|_| invalid(&format!("invalid prefix length {}", parts[1])))?;
        if mask > MAX_LENGTH {
            return Err(invalid("network length is too long"));
        }
        Ok(Ipv4 { addr, mask })
    }

    /// Same block with host bits cleared, used as the identity of a subnet.
    pub fn network(&self) -> Ipv4 {
        Ipv4 {
            addr: self.lo(),
            mask: self.mask,
        }
    }

    /// Get the highest (broadcast) address in the subnet.
    pub fn hi(&self) -> Ipv4Addr {
        broadcast_addr(self.addr, self.mask).unwrap_or(self.addr)
    }

    /// Get the lowest (network) address in the subnet.
    pub fn lo(&self) -> Ipv4Addr {
        cut_addr(self.addr, self.mask).unwrap_or(self.addr)
    }

    /// Dotted netmask, e.g. 255.255.255.0 for a /24.
    pub fn netmask(&self) -> Ipv4Addr {
        from_int(get_cidr_mask(self.mask).unwrap_or(u32::MAX))
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.lo() <= addr && addr <= self.hi()
    }

    pub fn contains_range(&self, range: &IpRange) -> bool {
        self.contains(range.start) && self.contains(range.end)
    }

    /// Host addresses between the network and broadcast address.
    pub fn usable_range(&self) -> Result<IpRange> {
        if self.mask > MAX_USABLE_PREFIX {
            return Err(Error::InvalidCidr {
                cidr: self.to_string(),
                reason: format!(
                    "prefix /{} leaves no usable host range for DHCP",
                    self.mask
                ),
            });
        }
        Ok(IpRange {
            start: from_int(to_int(self.lo()) + 1),
            end: from_int(to_int(self.hi()) - 1),
        })
    }
}

impl fmt::Display for Ipv4 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask)
    }
}

/// Inclusive, contiguous run of addresses with `start <= end`.
#[derive(Eq, PartialEq, Ord, PartialOrd, Debug, Copy, Clone, Hash)]
pub struct IpRange {
    pub start: Ipv4Addr,
    pub end: Ipv4Addr,
}

impl IpRange {
    /// Build a range, `None` if `start > end`.
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> Option<IpRange> {
        (start <= end).then_some(IpRange { start, end })
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.start <= addr && addr <= self.end
    }

    /// Number of addresses covered.
    pub fn size(&self) -> u64 {
        (to_int(self.end) - to_int(self.start)) as u64 + 1
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for IpRange {
    type Err = Error;

    /// Parse `<start>-<end>`; a single-address range is accepted.
    fn from_str(s: &str) -> Result<IpRange> {
        let (start, end) = parse_range_endpoints(s)?;
        IpRange::new(start, end).ok_or_else(|| Error::RangeInverted {
            range: s.to_string(),
        })
    }
}

impl Serialize for IpRange {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for IpRange {
    fn deserialize<D>(deserializer: D) -> std::result::Result<IpRange, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        IpRange::from_str(&s).map_err(de::Error::custom)
    }
}
