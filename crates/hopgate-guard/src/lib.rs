//! hopgate Guard
//!
//! SSRF defense for the forwarding gateway.
//!
//! Architecture:
//! 1. Target URL parsed → IPv6 literals dropped before any DNS lookup
//! 2. Host resolved → every A and AAAA record collected
//! 3. Each address classified → invalid families rejected
//! 4. Each address checked against the reserved-range tables
//! 5. Admission carries the checked addresses to the forwarder

mod address;
mod blocklist;
mod error;
mod gatekeeper;
mod resolver;
mod target;

pub use address::{classify, AddressFamily, ClassifiedAddress, IPV4_BITS, IPV6_BITS};
pub use blocklist::{blocked_ranges, is_allowed, matching_range, Cidr, CidrError};
pub use error::{ErrorKind, GuardError};
pub use gatekeeper::{check_all, Admission, Gatekeeper};
pub use resolver::{DnsConfig, DnsResolver, Resolve, ResolvedAddress};
pub use target::{TargetHost, TargetUrl};
