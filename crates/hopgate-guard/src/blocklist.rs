//! Reserved Network Blocklist
//!
//! Process-wide, read-only tables of IPv4 and IPv6 ranges that the gateway
//! must never dial. Built once on first use and shared by every request
//! without locking.
//!
//! Containment for a prefix of length P over an address of width W:
//! `(addr & mask) == (network & mask)` where `mask` has the top P bits set.
//! P = 0 matches the whole family, P = W is exact equality.

use crate::address::{AddressFamily, ClassifiedAddress, IPV4_BITS, IPV6_BITS};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

/// Blocked IPv4 ranges
const BLOCKED_IPV4: &[&str] = &[
    "0.0.0.0/8",          // "this" network
    "10.0.0.0/8",         // RFC 1918
    "100.64.0.0/10",      // carrier-grade NAT
    "127.0.0.0/8",        // loopback
    "169.254.0.0/16",     // link-local
    "172.16.0.0/12",      // RFC 1918
    "192.0.0.0/24",       // IETF protocol assignments
    "192.0.2.0/24",       // TEST-NET-1
    "192.88.99.0/24",     // 6to4 relay anycast
    "192.168.0.0/16",     // RFC 1918
    "198.18.0.0/15",      // benchmarking
    "198.51.100.0/24",    // TEST-NET-2
    "203.0.113.0/24",     // TEST-NET-3
    "224.0.0.0/4",        // multicast
    "240.0.0.0/4",        // reserved
    "255.255.255.255/32", // limited broadcast
];

/// Blocked IPv6 ranges
const BLOCKED_IPV6: &[&str] = &[
    "::/128",        // unspecified
    "::1/128",       // loopback
    "::ffff:0:0/96", // IPv4-mapped
    "64:ff9b::/96",  // IPv4/IPv6 translation
    "100::/64",      // discard-only
    "2001:db8::/32", // documentation
    "2001::/23",     // IETF protocol assignments (Teredo etc.)
    "2001:2::/48",   // benchmarking
    "fc00::/7",      // unique local
    "fe80::/10",     // link-local
    "fec0::/10",     // site-local (deprecated)
    "ff00::/8",      // multicast
];

static BLOCKED_V4_RANGES: LazyLock<Vec<Cidr>> = LazyLock::new(|| build_table(BLOCKED_IPV4));
static BLOCKED_V6_RANGES: LazyLock<Vec<Cidr>> = LazyLock::new(|| build_table(BLOCKED_IPV6));

fn build_table(entries: &[&str]) -> Vec<Cidr> {
    entries
        .iter()
        .filter_map(|entry| match entry.parse::<Cidr>() {
            Ok(cidr) => Some(cidr),
            Err(e) => {
                // Only reachable if the literal tables above are edited badly
                tracing::error!("Invalid blocklist entry {}: {}", entry, e);
                None
            }
        })
        .collect()
}

/// CIDR parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CidrError {
    #[error("Missing '/' prefix separator")]
    MissingPrefix,

    #[error("Invalid network address: {0}")]
    InvalidAddress(String),

    #[error("Invalid prefix length: {0}")]
    InvalidPrefix(String),

    #[error("Prefix length {prefix_len} exceeds {width}-bit address width")]
    PrefixTooLong { prefix_len: u8, width: u8 },
}

/// A network range: address plus prefix length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Cidr {
    /// Network address (IPv4 in the low 32 bits)
    network: u128,
    /// Number of leading bits that must match
    prefix_len: u8,
    /// Address family
    family: AddressFamily,
}

impl Cidr {
    /// Build a range from a classified network address.
    pub fn new(network: ClassifiedAddress, prefix_len: u8) -> Result<Self, CidrError> {
        let family = network.family();
        let (value, width) = match (network.value(), family.width()) {
            (Some(value), Some(width)) => (value, width),
            _ => return Err(CidrError::InvalidAddress(network.to_string())),
        };
        if prefix_len > width {
            return Err(CidrError::PrefixTooLong { prefix_len, width });
        }
        Ok(Self {
            network: value,
            prefix_len,
            family,
        })
    }

    pub fn family(&self) -> AddressFamily {
        self.family
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Network address widened to `u128`
    pub fn network(&self) -> u128 {
        self.network
    }

    /// Mask with the top `prefix_len` bits of the family width set.
    ///
    /// Shifts are done with `checked_shl` so that a zero-length prefix
    /// (shift by the full width) yields an empty mask instead of overflowing.
    pub fn mask(&self) -> u128 {
        match self.family {
            AddressFamily::V4 => {
                let shift = u32::from(IPV4_BITS - self.prefix_len);
                u128::from(u32::MAX.checked_shl(shift).unwrap_or(0))
            }
            AddressFamily::V6 => {
                let shift = u32::from(IPV6_BITS - self.prefix_len);
                u128::MAX.checked_shl(shift).unwrap_or(0)
            }
            AddressFamily::Invalid => 0,
        }
    }

    /// Whether `addr` lies inside this range.
    ///
    /// An address of the other family (or an invalid one) is never contained.
    pub fn contains(&self, addr: &ClassifiedAddress) -> bool {
        if addr.family() != self.family {
            return false;
        }
        match addr.value() {
            Some(value) => {
                let mask = self.mask();
                value & mask == self.network & mask
            }
            None => false,
        }
    }
}

impl FromStr for Cidr {
    type Err = CidrError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, prefix) = s.split_once('/').ok_or(CidrError::MissingPrefix)?;
        let network = ClassifiedAddress::classify(addr);
        if network == ClassifiedAddress::Invalid {
            return Err(CidrError::InvalidAddress(addr.to_string()));
        }
        let prefix_len = prefix
            .parse::<u8>()
            .map_err(|_| CidrError::InvalidPrefix(prefix.to_string()))?;
        Self::new(network, prefix_len)
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let network = match self.family {
            AddressFamily::V4 => ClassifiedAddress::V4(self.network as u32),
            AddressFamily::V6 => ClassifiedAddress::V6(self.network),
            AddressFamily::Invalid => ClassifiedAddress::Invalid,
        };
        write!(f, "{}/{}", network, self.prefix_len)
    }
}

/// The static blocked ranges for a family (empty for `Invalid`)
pub fn blocked_ranges(family: AddressFamily) -> &'static [Cidr] {
    match family {
        AddressFamily::V4 => BLOCKED_V4_RANGES.as_slice(),
        AddressFamily::V6 => BLOCKED_V6_RANGES.as_slice(),
        AddressFamily::Invalid => &[],
    }
}

/// First blocked range containing `addr`, if any
pub fn matching_range(addr: &ClassifiedAddress) -> Option<&'static Cidr> {
    blocked_ranges(addr.family())
        .iter()
        .find(|range| range.contains(addr))
}

/// Whether `addr` may be dialled.
///
/// Invalid addresses are never allowed.
pub fn is_allowed(addr: &ClassifiedAddress) -> bool {
    if *addr == ClassifiedAddress::Invalid {
        return false;
    }
    matching_range(addr).is_none()
}
