//! Admission Pipeline
//!
//! Decides whether a caller-supplied target may be fetched.
//!
//! Flow:
//! 1. Missing/empty `url` → `MissingUrlParam`
//! 2. Parse → `InvalidUrl` / `Ipv6LiteralRejected` (no DNS yet)
//! 3. Resolve (bounded by a timeout) → `UnresolvableHost`
//! 4. Classify every address → `MalformedAddress`
//! 5. Check every address against the blocklist → `BlockedAddress`
//! 6. Admit, carrying the exact addresses that passed
//!
//! Steps 4 and 5 run per address and the first failure rejects the whole
//! request: admission is an AND over the resolved set.

use crate::address::{AddressFamily, ClassifiedAddress};
use crate::blocklist;
use crate::error::GuardError;
use crate::resolver::{ResolvedAddress, Resolve};
use crate::target::TargetUrl;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

/// A target that passed every check
#[derive(Debug, Clone)]
pub struct Admission {
    /// The validated target
    pub target: TargetUrl,
    /// Addresses that passed; the forwarder must dial only these
    pub addresses: Vec<IpAddr>,
}

/// Runs the admission pipeline against a resolver
pub struct Gatekeeper<R> {
    resolver: R,
    resolve_timeout: Duration,
}

impl<R: Resolve> Gatekeeper<R> {
    pub fn new(resolver: R, resolve_timeout: Duration) -> Self {
        Self {
            resolver,
            resolve_timeout,
        }
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Validate `raw` and decide admission.
    ///
    /// `None` and the empty string both mean the parameter is missing.
    pub async fn admit(&self, raw: Option<&str>) -> Result<Admission, GuardError> {
        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Err(GuardError::MissingUrlParam),
        };

        let target = TargetUrl::parse(raw).inspect_err(|e| debug!("Rejected target: {}", e))?;
        let host = target.host_str().to_string();

        let resolved = tokio::time::timeout(self.resolve_timeout, self.resolver.resolve(target.host()))
            .await
            .map_err(|_| GuardError::UnresolvableHost {
                host: host.clone(),
                reason: format!("lookup timed out after {:?}", self.resolve_timeout),
            })??;

        if resolved.is_empty() {
            return Err(GuardError::UnresolvableHost {
                host,
                reason: "no addresses returned".to_string(),
            });
        }

        let addresses = check_all(&host, &resolved).inspect_err(|e| warn!("{}", e))?;

        debug!("Admitted {} -> {:?}", target, addresses);
        Ok(Admission { target, addresses })
    }
}

/// Classify and blocklist-check every resolved address.
///
/// Returns the parsed addresses if all pass, otherwise the first failure.
pub fn check_all(host: &str, resolved: &[ResolvedAddress]) -> Result<Vec<IpAddr>, GuardError> {
    resolved
        .iter()
        .map(|entry| check_one(host, entry))
        .collect()
}

fn check_one(host: &str, entry: &ResolvedAddress) -> Result<IpAddr, GuardError> {
    let malformed = || GuardError::MalformedAddress {
        host: host.to_string(),
        address: entry.text.clone(),
    };

    if entry.family == AddressFamily::Invalid {
        return Err(malformed());
    }

    // The reported family must agree with the text it labels
    let classified = ClassifiedAddress::classify(&entry.text);
    if classified.family() != entry.family {
        return Err(malformed());
    }
    let ip = classified.to_ip_addr().ok_or_else(malformed)?;

    if let Some(range) = blocklist::matching_range(&classified) {
        return Err(GuardError::BlockedAddress {
            host: host.to_string(),
            address: entry.text.clone(),
            range: range.to_string(),
        });
    }

    Ok(ip)
}
