//! Target address validation
//!
//! An [`Address`] is only ever constructed through [`Address::parse`], so any
//! value of this type has already passed the syntactic checks below.

use serde::Serialize;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::error::ValidationError;

/// Maximum length of a hostname (RFC 1035)
const MAX_HOSTNAME_LEN: usize = 253;
/// Maximum length of a single hostname label
const MAX_LABEL_LEN: usize = 63;

/// What kind of endpoint an address names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Ipv4(Ipv4Addr),
    Ipv6(Ipv6Addr),
    Hostname,
}

/// A validated, immutable target endpoint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Validate user input and build an address.
    ///
    /// Surrounding whitespace is trimmed. IPv6 literals may be bracketed
    /// (`[::1]`); the brackets are not kept.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::Empty);
        }

        let unbracketed = trimmed
            .strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'));

        if let Some(inner) = unbracketed {
            return inner
                .parse::<Ipv6Addr>()
                .map(|ip| Self(ip.to_string()))
                .map_err(|_| ValidationError::Malformed);
        }

        if let Ok(ip) = trimmed.parse::<IpAddr>() {
            return Ok(Self(ip.to_string()));
        }

        if is_valid_hostname(trimmed) {
            return Ok(Self(trimmed.trim_end_matches('.').to_ascii_lowercase()));
        }

        Err(ValidationError::Malformed)
    }

    /// The address as text (IP literals in canonical form)
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Classify the address
    pub fn kind(&self) -> AddressKind {
        match self.0.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) => AddressKind::Ipv4(ip),
            Ok(IpAddr::V6(ip)) => AddressKind::Ipv6(ip),
            Err(_) => AddressKind::Hostname,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Address {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// RFC 1123 hostname check.
///
/// A name whose last label is all digits is treated as a failed IPv4
/// literal, so `999.999.999.999` and `10.0.0` are rejected here.
fn is_valid_hostname(name: &str) -> bool {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() || name.len() > MAX_HOSTNAME_LEN {
        return false;
    }

    let labels: Vec<&str> = name.split('.').collect();
    let label_ok = |label: &&str| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
    };
    if !labels.iter().all(label_ok) {
        return false;
    }

    match labels.last() {
        Some(last) => !last.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_whitespace() {
        assert_eq!(Address::parse(""), Err(ValidationError::Empty));
        assert_eq!(Address::parse("   \t\n"), Err(ValidationError::Empty));
    }

    #[test]
    fn test_malformed() {
        for input in [
            "999.999.999.999",
            "not_an_ip",
            "10.0.0",
            "256.1.1.1",
            "-leading.example.com",
            "trailing-.example.com",
            "a..b",
            "[10.0.0.1]",
            "host.123",
            "fe80::1::2",
        ] {
            assert_eq!(
                Address::parse(input),
                Err(ValidationError::Malformed),
                "{input} should be rejected"
            );
        }
    }

    #[test]
    fn test_ip_literals() {
        let v4 = Address::parse(" 192.168.1.1 ").unwrap();
        assert_eq!(v4.as_str(), "192.168.1.1");
        assert!(matches!(v4.kind(), AddressKind::Ipv4(_)));

        let v6 = Address::parse("[2001:DB8::1]").unwrap();
        assert_eq!(v6.as_str(), "2001:db8::1");
        assert!(matches!(v6.kind(), AddressKind::Ipv6(_)));
    }

    #[test]
    fn test_hostnames() {
        let host = Address::parse("VPN.Example.com.").unwrap();
        assert_eq!(host.as_str(), "vpn.example.com");
        assert_eq!(host.kind(), AddressKind::Hostname);

        assert!(Address::parse("localhost").is_ok());
        assert!(Address::parse("edge-01.eu-west.example").is_ok());
        assert!(Address::parse(&"a".repeat(64)).is_err());
    }
}
