//! Target URL Validation
//!
//! Parses the caller-supplied `url` parameter. Only absolute `http`/`https`
//! URLs with a host get through. Bracketed IPv6 hosts are refused here,
//! before any resolution happens, even if the literal would pass the
//! IPv6 blocklist.

use crate::error::GuardError;
use std::net::Ipv4Addr;
use url::{Host, Url};

/// Schemes the forwarder can speak
const SUPPORTED_SCHEMES: &[&str] = &["http", "https"];

/// Host portion of a validated target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetHost {
    /// A DNS name that still needs resolving
    Domain(String),
    /// An IPv4 literal (after WHATWG normalisation, so `2130706433` is here too)
    Ipv4(Ipv4Addr),
}

/// A parsed, syntactically acceptable target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    url: Url,
    host: TargetHost,
}

impl TargetUrl {
    /// Parse and validate a raw target string
    pub fn parse(raw: &str) -> Result<Self, GuardError> {
        let url = Url::parse(raw).map_err(|e| GuardError::InvalidUrl(format!("{}: {}", raw, e)))?;

        // IPv6 literals are refused whatever the scheme
        let host = match url.host() {
            Some(Host::Ipv6(addr)) => return Err(GuardError::Ipv6LiteralRejected(addr.to_string())),
            Some(Host::Domain(domain)) if !domain.is_empty() => Some(TargetHost::Domain(domain.to_string())),
            Some(Host::Ipv4(addr)) => Some(TargetHost::Ipv4(addr)),
            _ => None,
        };

        if !SUPPORTED_SCHEMES.contains(&url.scheme()) {
            return Err(GuardError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }

        let host = host.ok_or_else(|| GuardError::InvalidUrl(format!("{}: missing host", raw)))?;

        Ok(Self { url, host })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn host(&self) -> &TargetHost {
        &self.host
    }

    /// Host as written in the URL (normalised), used for SNI and `Host`
    pub fn host_str(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn is_https(&self) -> bool {
        self.url.scheme() == "https"
    }

    /// Explicit port or the scheme default
    pub fn port(&self) -> u16 {
        self.url
            .port_or_known_default()
            .unwrap_or(if self.is_https() { 443 } else { 80 })
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// Origin-form request target (`/path?query`)
    pub fn request_target(&self) -> String {
        match self.url.query() {
            Some(query) => format!("{}?{}", self.url.path(), query),
            None => self.url.path().to_string(),
        }
    }

    /// Value for the `Host` header: host plus a non-default port
    pub fn authority(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{}", self.host_str(), port),
            None => self.host_str().to_string(),
        }
    }
}

impl std::fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn kind_of(raw: &str) -> ErrorKind {
        TargetUrl::parse(raw).unwrap_err().kind()
    }

    #[test]
    fn test_parse_components() {
        let target = TargetUrl::parse("https://Example.COM:8443/a/b?x=1&y=2#frag").unwrap();
        assert_eq!(target.scheme(), "https");
        assert_eq!(target.host(), &TargetHost::Domain("example.com".into()));
        assert_eq!(target.port(), 8443);
        assert_eq!(target.path(), "/a/b");
        assert_eq!(target.query(), Some("x=1&y=2"));
        assert_eq!(target.request_target(), "/a/b?x=1&y=2");
        assert_eq!(target.authority(), "example.com:8443");
    }

    #[test]
    fn test_default_ports() {
        assert_eq!(TargetUrl::parse("http://example.com").unwrap().port(), 80);
        assert_eq!(TargetUrl::parse("https://example.com").unwrap().port(), 443);
        let target = TargetUrl::parse("http://example.com:80/").unwrap();
        assert_eq!(target.authority(), "example.com");
        assert_eq!(target.request_target(), "/");
    }

    #[test]
    fn test_rejects_relative_and_garbage() {
        assert_eq!(kind_of("not-a-url"), ErrorKind::InvalidUrl);
        assert_eq!(kind_of("/relative/path"), ErrorKind::InvalidUrl);
        assert_eq!(kind_of("example.com"), ErrorKind::InvalidUrl);
        assert_eq!(kind_of(""), ErrorKind::InvalidUrl);
        assert_eq!(kind_of("http://"), ErrorKind::InvalidUrl);
    }

    #[test]
    fn test_rejects_unsupported_schemes() {
        assert_eq!(kind_of("ftp://example.com/file"), ErrorKind::InvalidUrl);
        assert_eq!(kind_of("file:///etc/passwd"), ErrorKind::InvalidUrl);
        assert_eq!(kind_of("gopher://127.0.0.1:6379/_"), ErrorKind::InvalidUrl);
        assert_eq!(kind_of("mailto:user@example.com"), ErrorKind::InvalidUrl);
    }

    #[test]
    fn test_rejects_ipv6_literals() {
        assert_eq!(kind_of("http://[::1]/"), ErrorKind::Ipv6LiteralRejected);
        assert_eq!(kind_of("http://[2606:4700::1111]:8080/"), ErrorKind::Ipv6LiteralRejected);
        assert_eq!(kind_of("https://[::ffff:8.8.8.8]/"), ErrorKind::Ipv6LiteralRejected);
    }

    #[test]
    fn test_ipv6_literal_wins_over_scheme() {
        assert_eq!(kind_of("ftp://[::1]/"), ErrorKind::Ipv6LiteralRejected);
        assert_eq!(kind_of("gopher://[::1]/"), ErrorKind::Ipv6LiteralRejected);
        assert_eq!(kind_of("ftp://127.0.0.1/"), ErrorKind::InvalidUrl);
    }

    #[test]
    fn test_ipv4_literals_pass_through() {
        let target = TargetUrl::parse("http://169.254.169.254/latest/meta-data").unwrap();
        assert_eq!(target.host(), &TargetHost::Ipv4(Ipv4Addr::new(169, 254, 169, 254)));

        // WHATWG parsing normalises numeric shorthands into dotted form
        let target = TargetUrl::parse("http://2130706433/").unwrap();
        assert_eq!(target.host(), &TargetHost::Ipv4(Ipv4Addr::LOCALHOST));
        let target = TargetUrl::parse("http://0x7f.1/").unwrap();
        assert_eq!(target.host(), &TargetHost::Ipv4(Ipv4Addr::new(127, 0, 0, 1)));
    }
}
