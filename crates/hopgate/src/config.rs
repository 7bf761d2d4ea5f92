//! Gateway Configuration
//!
//! Settings come from the environment:
//! - `PORT`: listening port (default 7000 when absent or not a port number)
//! - `HOSTNAME`: bind address, honoured only when it is a dotted IPv4 literal
//! - `HOPGATE_RESOLVE_TIMEOUT_SECS`, `HOPGATE_UPSTREAM_TIMEOUT_SECS`,
//!   `HOPGATE_MAX_BODY_BYTES`: optional positive overrides

use crate::client::HttpClientConfig;
use hopgate_guard::DnsConfig;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_PORT: u16 = 7000;
const DEFAULT_BIND: Ipv4Addr = Ipv4Addr::LOCALHOST;

/// Gateway configuration
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind address
    pub bind_addr: Ipv4Addr,
    /// Listening port
    pub port: u16,
    /// Upper bound on name resolution
    pub resolve_timeout: Duration,
    /// Upper bound on the whole upstream exchange
    pub upstream_timeout: Duration,
    /// Upper bound on each TCP connect attempt
    pub connect_timeout: Duration,
    /// Maximum inbound request body (bytes)
    pub max_request_body: usize,
    /// Maximum upstream response body (bytes)
    pub max_response_body: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_BIND,
            port: DEFAULT_PORT,
            resolve_timeout: Duration::from_secs(5),
            upstream_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_request_body: 10 * 1024 * 1024, // 10 MB
            max_response_body: 10 * 1024 * 1024, // 10 MB
        }
    }
}

impl GatewayConfig {
    /// Load from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(port) = lookup("PORT").and_then(|v| v.trim().parse::<u16>().ok()) {
            config.port = port;
        }

        if let Some(host) = lookup("HOSTNAME").and_then(|v| parse_dotted_ipv4(&v)) {
            config.bind_addr = host;
        }

        if let Some(secs) = positive::<u64>(&lookup, "HOPGATE_RESOLVE_TIMEOUT_SECS") {
            config.resolve_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = positive::<u64>(&lookup, "HOPGATE_UPSTREAM_TIMEOUT_SECS") {
            config.upstream_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = positive::<usize>(&lookup, "HOPGATE_MAX_BODY_BYTES") {
            config.max_request_body = bytes;
            config.max_response_body = bytes;
        }

        config
    }

    /// Address to listen on
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.bind_addr, self.port))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.resolve_timeout.is_zero() || self.upstream_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_request_body < 1024 || self.max_response_body < 1024 {
            return Err(ConfigError::BodyLimitTooLow);
        }
        Ok(())
    }

    /// Resolver settings derived from this config
    pub fn dns_config(&self) -> DnsConfig {
        DnsConfig {
            timeout: self.resolve_timeout,
            ..DnsConfig::default()
        }
    }

    /// Upstream client settings derived from this config
    pub fn http_client_config(&self) -> HttpClientConfig {
        HttpClientConfig {
            timeout: self.upstream_timeout,
            connect_timeout: self.connect_timeout,
            max_body_size: self.max_response_body,
            ..HttpClientConfig::default()
        }
    }
}

/// Accepts only `a.b.c.d` with 1-3 digit groups that form a real address
fn parse_dotted_ipv4(value: &str) -> Option<Ipv4Addr> {
    let dotted = value.split('.').count() == 4
        && value
            .split('.')
            .all(|part| (1..=3).contains(&part.len()) && part.bytes().all(|b| b.is_ascii_digit()));
    if !dotted {
        return None;
    }
    value.parse().ok()
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) if value > T::default() => Some(value),
        _ => {
            warn!("Ignoring {}={:?}: expected a positive integer", key, raw);
            None
        }
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("Timeouts must be greater than zero")]
    ZeroTimeout,

    #[error("Body limits too low (minimum 1KB)")]
    BodyLimitTooLow,
}
