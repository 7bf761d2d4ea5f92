//! Admission Errors
//!
//! Every way the pipeline can refuse a request, plus the stable wire kind
//! and HTTP status each refusal maps to.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Stable error kinds reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    #[serde(rename = "MissingURLParam")]
    MissingUrlParam,
    #[serde(rename = "InvalidURL")]
    InvalidUrl,
    #[serde(rename = "IPv6LiteralRejected")]
    Ipv6LiteralRejected,
    UnresolvableHost,
    MalformedAddress,
    BlockedAddress,
    UpstreamUnavailable,
    UpstreamTimeout,
    PayloadTooLarge,
    InternalError,
}

impl ErrorKind {
    /// Wire name used in the JSON error envelope
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingUrlParam => "MissingURLParam",
            Self::InvalidUrl => "InvalidURL",
            Self::Ipv6LiteralRejected => "IPv6LiteralRejected",
            Self::UnresolvableHost => "UnresolvableHost",
            Self::MalformedAddress => "MalformedAddress",
            Self::BlockedAddress => "BlockedAddress",
            Self::UpstreamUnavailable => "UpstreamUnavailable",
            Self::UpstreamTimeout => "UpstreamTimeout",
            Self::PayloadTooLarge => "PayloadTooLarge",
            Self::InternalError => "InternalError",
        }
    }

    /// HTTP status code for this kind
    pub fn status_code(self) -> u16 {
        match self {
            Self::MissingUrlParam => 404,
            Self::InvalidUrl | Self::UnresolvableHost => 400,
            Self::Ipv6LiteralRejected | Self::MalformedAddress | Self::BlockedAddress => 403,
            Self::UpstreamUnavailable => 502,
            Self::UpstreamTimeout => 504,
            Self::PayloadTooLarge => 413,
            Self::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasons the admission pipeline rejects a target
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    #[error("Missing 'url' query parameter")]
    MissingUrlParam,

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IPv6 literal hosts are not forwarded: {0}")]
    Ipv6LiteralRejected(String),

    #[error("Could not resolve host {host}: {reason}")]
    UnresolvableHost { host: String, reason: String },

    #[error("Host {host} resolved to malformed address {address:?}")]
    MalformedAddress { host: String, address: String },

    #[error("Host {host} resolves to blocked address {address} ({range})")]
    BlockedAddress {
        host: String,
        address: String,
        range: String,
    },
}

impl GuardError {
    /// Wire kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingUrlParam => ErrorKind::MissingUrlParam,
            Self::InvalidUrl(_) => ErrorKind::InvalidUrl,
            Self::Ipv6LiteralRejected(_) => ErrorKind::Ipv6LiteralRejected,
            Self::UnresolvableHost { .. } => ErrorKind::UnresolvableHost,
            Self::MalformedAddress { .. } => ErrorKind::MalformedAddress,
            Self::BlockedAddress { .. } => ErrorKind::BlockedAddress,
        }
    }

    /// Optional hint for the caller on how to fix the request
    pub fn advice(&self) -> Option<&'static str> {
        match self {
            Self::MissingUrlParam => Some("Pass the target as ?url=<absolute http(s) URL>"),
            Self::InvalidUrl(_) => Some("The target must be an absolute http:// or https:// URL"),
            Self::Ipv6LiteralRejected(_) => Some("Use a hostname instead of a bracketed IPv6 address"),
            Self::UnresolvableHost { .. } => Some("Check that the hostname exists and is publicly resolvable"),
            Self::MalformedAddress { .. } | Self::BlockedAddress { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ErrorKind::MissingUrlParam.status_code(), 404);
        assert_eq!(ErrorKind::InvalidUrl.status_code(), 400);
        assert_eq!(ErrorKind::Ipv6LiteralRejected.status_code(), 403);
        assert_eq!(ErrorKind::UnresolvableHost.status_code(), 400);
        assert_eq!(ErrorKind::MalformedAddress.status_code(), 403);
        assert_eq!(ErrorKind::BlockedAddress.status_code(), 403);
        assert_eq!(ErrorKind::UpstreamUnavailable.status_code(), 502);
        assert_eq!(ErrorKind::UpstreamTimeout.status_code(), 504);
        assert_eq!(ErrorKind::PayloadTooLarge.status_code(), 413);
        assert_eq!(ErrorKind::InternalError.status_code(), 500);
    }

    #[test]
    fn test_wire_names_match_serde() {
        for kind in [
            ErrorKind::MissingUrlParam,
            ErrorKind::InvalidUrl,
            ErrorKind::Ipv6LiteralRejected,
            ErrorKind::BlockedAddress,
            ErrorKind::UpstreamTimeout,
            ErrorKind::PayloadTooLarge,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }

    #[test]
    fn test_guard_error_kinds() {
        let err = GuardError::BlockedAddress {
            host: "metadata".into(),
            address: "169.254.169.254".into(),
            range: "169.254.0.0/16".into(),
        };
        assert_eq!(err.kind(), ErrorKind::BlockedAddress);
        assert!(err.to_string().contains("169.254.0.0/16"));
        assert_eq!(GuardError::MissingUrlParam.kind(), ErrorKind::MissingUrlParam);
    }
}
