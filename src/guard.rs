//! Untrusted-target URL guard
//!
//! Every fetch this crate performs happens from the server's own network
//! position, against URLs supplied by the caller. Targets are therefore
//! restricted to public http(s) hosts before any socket is opened.

use std::net::IpAddr;

use url::{Host, Url};

/// Reason a target URL was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardError {
    SchemeNotAllowed(String),
    MissingHost,
    PrivateAddress(String),
}

impl std::fmt::Display for GuardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardError::SchemeNotAllowed(s) => write!(f, "scheme '{}' is not allowed", s),
            GuardError::MissingHost => write!(f, "URL has no host"),
            GuardError::PrivateAddress(h) => write!(f, "host '{}' is not publicly routable", h),
        }
    }
}

/// Check that a URL points at a public http(s) host.
///
/// Hostnames are accepted as-is (no resolution happens here); literal IP
/// hosts must be publicly routable.
pub fn ensure_public_target(url: &Url) -> Result<(), GuardError> {
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(GuardError::SchemeNotAllowed(other.to_string())),
    }

    match url.host() {
        None => Err(GuardError::MissingHost),
        Some(Host::Domain(domain)) => {
            // "localhost" resolves to loopback everywhere; treat like a literal
            if domain.eq_ignore_ascii_case("localhost") {
                Err(GuardError::PrivateAddress(domain.to_string()))
            } else {
                Ok(())
            }
        }
        Some(Host::Ipv4(addr)) => check_ip(IpAddr::V4(addr)),
        Some(Host::Ipv6(addr)) => check_ip(IpAddr::V6(addr)),
    }
}

fn check_ip(addr: IpAddr) -> Result<(), GuardError> {
    let blocked = match addr {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // unique-local fc00::/7
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // link-local fe80::/10
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    };

    if blocked {
        Err(GuardError::PrivateAddress(addr.to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(url: &str) -> Result<(), GuardError> {
        ensure_public_target(&Url::parse(url).unwrap())
    }

    #[test]
    fn test_public_hosts_allowed() {
        assert!(check("https://example.com/page").is_ok());
        assert!(check("http://93.184.216.34/").is_ok());
    }

    #[test]
    fn test_non_http_schemes_refused() {
        assert_eq!(
            check("file:///etc/passwd"),
            Err(GuardError::SchemeNotAllowed("file".into()))
        );
        assert!(matches!(check("ftp://example.com/"), Err(GuardError::SchemeNotAllowed(_))));
    }

    #[test]
    fn test_loopback_and_private_refused() {
        assert!(matches!(check("http://127.0.0.1/"), Err(GuardError::PrivateAddress(_))));
        assert!(matches!(check("http://localhost:8080/"), Err(GuardError::PrivateAddress(_))));
        assert!(matches!(check("http://192.168.1.1/admin"), Err(GuardError::PrivateAddress(_))));
        assert!(matches!(check("http://10.0.0.5/"), Err(GuardError::PrivateAddress(_))));
        assert!(matches!(check("http://169.254.169.254/"), Err(GuardError::PrivateAddress(_))));
        assert!(matches!(check("http://[::1]/"), Err(GuardError::PrivateAddress(_))));
        assert!(matches!(check("http://[fe80::1]/"), Err(GuardError::PrivateAddress(_))));
    }
}
