//! Async DNS Resolution
//!
//! Resolves a target host to EVERY address the name servers return:
//! - A and AAAA records are both requested (no "first answer wins")
//! - IPv4 literal hosts resolve to themselves without a query
//! - Failures surface as `UnresolvableHost`, never as a blocked address
//!
//! No gateway-level cache sits on top of the resolver.

use crate::address::{AddressFamily, ClassifiedAddress};
use crate::error::GuardError;
use crate::target::TargetHost;
use hickory_resolver::config::{LookupIpStrategy, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One address returned by name resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// Textual form as produced by the resolver
    pub text: String,
    /// Family of `text`
    pub family: AddressFamily,
}

impl ResolvedAddress {
    /// Build from raw resolver text, classifying it
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        let family = ClassifiedAddress::classify(&text).family();
        Self { text, family }
    }
}

impl From<IpAddr> for ResolvedAddress {
    fn from(addr: IpAddr) -> Self {
        Self::from_text(addr.to_string())
    }
}

/// Something that can turn a host into its address set.
///
/// Implementations must return every record they know about; the
/// gatekeeper admits only if all of them pass.
pub trait Resolve: Send + Sync {
    fn resolve(
        &self,
        host: &TargetHost,
    ) -> impl Future<Output = Result<Vec<ResolvedAddress>, GuardError>> + Send;
}

/// DNS resolver configuration
#[derive(Debug, Clone)]
pub struct DnsConfig {
    /// Timeout for a single DNS query
    pub timeout: Duration,
    /// Attempts per name server
    pub attempts: usize,
    /// Whether to use system DNS or Cloudflare
    pub use_system_dns: bool,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            attempts: 2,
            use_system_dns: true,
        }
    }
}

/// hickory-backed resolver requesting both address families
pub struct DnsResolver {
    resolver: TokioAsyncResolver,
}

impl DnsResolver {
    /// Create a new DNS resolver
    ///
    /// An unreadable system configuration falls back to Cloudflare.
    pub fn new(config: DnsConfig) -> Self {
        let (resolver_config, mut opts) = if config.use_system_dns {
            match hickory_resolver::system_conf::read_system_conf() {
                Ok(system) => system,
                Err(e) => {
                    warn!("Falling back to Cloudflare DNS, system config unreadable: {}", e);
                    (ResolverConfig::cloudflare(), ResolverOpts::default())
                }
            }
        } else {
            (ResolverConfig::cloudflare(), ResolverOpts::default())
        };

        opts.ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
        opts.timeout = config.timeout;
        opts.attempts = config.attempts;

        info!(
            "DNS resolver initialized (system: {}, timeout: {:?})",
            config.use_system_dns, config.timeout
        );

        Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(DnsConfig::default())
    }

    async fn lookup(&self, domain: &str) -> Result<Vec<IpAddr>, GuardError> {
        debug!("DNS lookup for: {}", domain);
        let lookup = self
            .resolver
            .lookup_ip(domain)
            .await
            .map_err(|e| GuardError::UnresolvableHost {
                host: domain.to_string(),
                reason: e.to_string(),
            })?;

        Ok(lookup.iter().collect())
    }
}

impl Resolve for DnsResolver {
    async fn resolve(&self, host: &TargetHost) -> Result<Vec<ResolvedAddress>, GuardError> {
        let addresses = match host {
            TargetHost::Ipv4(addr) => vec![IpAddr::V4(*addr)],
            TargetHost::Domain(domain) => self.lookup(domain).await?,
        };
        Ok(addresses.into_iter().map(ResolvedAddress::from).collect())
    }
}
