//! Address Classification
//!
//! Turns a textual address into its family and a fixed-width integer
//! suitable for prefix arithmetic:
//! - IPv4 → `u32` (four dotted decimal octets, nothing else)
//! - IPv6 → `u128` (full RFC 4291 text form, `::` runs and dotted-quad tails)
//! - anything else → `Invalid`
//!
//! Parsing is delegated to `std::net`, whose grammar is exactly the one we
//! want: no shorthand IPv4 (`127.1`), no leading zeros, no zone ids.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Width of an IPv4 address in bits
pub const IPV4_BITS: u8 = 32;

/// Width of an IPv6 address in bits
pub const IPV6_BITS: u8 = 128;

/// Address family of a textual address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// 32-bit IPv4
    V4,
    /// 128-bit IPv6
    V6,
    /// Neither a valid IPv4 nor a valid IPv6 address
    Invalid,
}

impl AddressFamily {
    /// Numeric family as reported by resolvers (4, 6, or 0 for invalid)
    pub fn number(self) -> u8 {
        match self {
            Self::V4 => 4,
            Self::V6 => 6,
            Self::Invalid => 0,
        }
    }

    /// Address width in bits, `None` for invalid addresses
    pub fn width(self) -> Option<u8> {
        match self {
            Self::V4 => Some(IPV4_BITS),
            Self::V6 => Some(IPV6_BITS),
            Self::Invalid => None,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::V4 => write!(f, "IPv4"),
            Self::V6 => write!(f, "IPv6"),
            Self::Invalid => write!(f, "invalid"),
        }
    }
}

/// A classified address carrying its numeric value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassifiedAddress {
    V4(u32),
    V6(u128),
    Invalid,
}

impl ClassifiedAddress {
    /// Classify a textual address.
    ///
    /// Surrounding whitespace is not trimmed: `" 10.0.0.1"` is invalid.
    pub fn classify(text: &str) -> Self {
        if let Ok(v4) = text.parse::<Ipv4Addr>() {
            return Self::V4(u32::from(v4));
        }
        if let Ok(v6) = text.parse::<Ipv6Addr>() {
            return Self::V6(u128::from(v6));
        }
        Self::Invalid
    }

    /// Family of this address
    pub fn family(&self) -> AddressFamily {
        match self {
            Self::V4(_) => AddressFamily::V4,
            Self::V6(_) => AddressFamily::V6,
            Self::Invalid => AddressFamily::Invalid,
        }
    }

    /// Numeric value widened to `u128` (IPv4 lives in the low 32 bits)
    pub fn value(&self) -> Option<u128> {
        match self {
            Self::V4(v) => Some(u128::from(*v)),
            Self::V6(v) => Some(*v),
            Self::Invalid => None,
        }
    }

    /// Convert back to a `std::net` address
    pub fn to_ip_addr(&self) -> Option<IpAddr> {
        match self {
            Self::V4(v) => Some(IpAddr::V4(Ipv4Addr::from(*v))),
            Self::V6(v) => Some(IpAddr::V6(Ipv6Addr::from(*v))),
            Self::Invalid => None,
        }
    }
}

impl From<IpAddr> for ClassifiedAddress {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => Self::V4(u32::from(v4)),
            IpAddr::V6(v6) => Self::V6(u128::from(v6)),
        }
    }
}

impl fmt::Display for ClassifiedAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_ip_addr() {
            Some(ip) => write!(f, "{}", ip),
            None => write!(f, "<invalid>"),
        }
    }
}

/// Classify a textual address (shorthand for [`ClassifiedAddress::classify`])
#[inline]
pub fn classify(text: &str) -> ClassifiedAddress {
    ClassifiedAddress::classify(text)
}
