//! Free-form hub address parsing.
//!
//! Turns user input such as `hub.local`, `hub.local:9000` or
//! `https://10.0.0.5:8443/` plus optional host/port overrides into a
//! validated [`HubAddress`]. Only used before enrollment, when the user
//! has not yet got a full hub url.

use std::fmt;

use url::{Host, Url};

use hyperion_protocol::constants::DEFAULT_PORT;

/// Scheme substituted for whatever the user typed, so explicit ports are
/// never swallowed as a scheme default.
const PLACEHOLDER_SCHEME: &str = "hub";
const PLACEHOLDER_HOST: &str = "placeholder.invalid";

/// Errors from address resolution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address '{0}' has an invalid format")]
    InvalidFormat(String),

    #[error("a hostname is required (in the address or via the host override)")]
    HostnameRequired,

    #[error("port {0} is invalid (must be 1-65535)")]
    InvalidPort(u32),
}

/// A validated host/port pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubAddress {
    pub host: String,
    pub port: u16,
}

impl HubAddress {
    /// Composes a base hub url from this address.
    pub fn http_url(&self, tls: bool) -> String {
        let scheme = if tls { "https" } else { "http" };
        format!("{scheme}://{self}")
    }
}

impl fmt::Display for HubAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Resolves an address and overrides into a [`HubAddress`].
///
/// Overrides always win over values parsed from `address`. A missing
/// port defaults to [`DEFAULT_PORT`]. Empty strings count as absent.
pub fn resolve(
    address: Option<&str>,
    host_override: Option<&str>,
    port_override: Option<u32>,
) -> Result<HubAddress, AddressError> {
    let mut host = None;
    let mut port = None;

    if let Some(address) = non_empty(address) {
        let (parsed_host, parsed_port) = parse_address(address)?;
        host = parsed_host;
        port = parsed_port;
    }

    if let Some(h) = non_empty(host_override) {
        host = Some(h.to_string());
    }
    if port_override.is_some() {
        port = port_override;
    }

    let host = host.ok_or(AddressError::HostnameRequired)?;
    let port = port.unwrap_or(u32::from(DEFAULT_PORT));
    let port = u16::try_from(port)
        .ok()
        .filter(|p| *p != 0)
        .ok_or(AddressError::InvalidPort(port))?;

    Ok(HubAddress { host, port })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Extracts host and port from an address with or without a scheme.
fn parse_address(address: &str) -> Result<(Option<String>, Option<u32>), AddressError> {
    let invalid = || AddressError::InvalidFormat(address.to_string());

    let rest = match address.split_once("://") {
        Some((_, rest)) => rest,
        None => address.strip_prefix("//").unwrap_or(address),
    };

    // Port-only input such as ":9000" relies on the host override.
    let (authority, host_missing) = if rest.starts_with(':') {
        (format!("{PLACEHOLDER_HOST}{rest}"), true)
    } else {
        (rest.to_string(), false)
    };

    let parsed = Url::parse(&format!("{PLACEHOLDER_SCHEME}://{authority}")).map_err(|_| invalid())?;

    let host = match parsed.host() {
        _ if host_missing => None,
        Some(Host::Domain(d)) if !d.is_empty() => Some(d.to_ascii_lowercase()),
        Some(Host::Ipv4(ip)) => Some(ip.to_string()),
        Some(Host::Ipv6(ip)) => Some(ip.to_string()),
        _ => None,
    };
    let port = parsed.port().map(u32::from);

    Ok((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(host: &str, port: u16) -> HubAddress {
        HubAddress {
            host: host.into(),
            port,
        }
    }

    #[test]
    fn host_and_port_from_address() {
        assert_eq!(
            resolve(Some("example.com:9000"), None, None).unwrap(),
            addr("example.com", 9000)
        );
    }

    #[test]
    fn port_override_applies_to_bare_host() {
        assert_eq!(
            resolve(Some("example.com"), None, Some(9000)).unwrap(),
            addr("example.com", 9000)
        );
    }

    #[test]
    fn missing_port_uses_default() {
        assert_eq!(
            resolve(Some("example.com"), None, None).unwrap(),
            addr("example.com", DEFAULT_PORT)
        );
        assert_eq!(
            resolve(None, Some("example.com"), None).unwrap(),
            addr("example.com", 2468)
        );
    }

    #[test]
    fn overrides_win_over_parsed_values() {
        let cases = [
            ("a.example:1000", Some("b.example"), None, addr("b.example", 1000)),
            ("a.example:1000", None, Some(2000), addr("a.example", 2000)),
            ("a.example:1000", Some("b.example"), Some(2000), addr("b.example", 2000)),
            ("http://a.example:1000/x", Some("c.example"), Some(3000), addr("c.example", 3000)),
        ];
        for (input, host, port, expected) in cases {
            assert_eq!(resolve(Some(input), host, port).unwrap(), expected, "input {input}");
        }
    }

    #[test]
    fn scheme_is_optional() {
        assert_eq!(
            resolve(Some("https://Hub.Example:8443/"), None, None).unwrap(),
            addr("hub.example", 8443)
        );
        assert_eq!(
            resolve(Some("//hub.example:7000"), None, None).unwrap(),
            addr("hub.example", 7000)
        );
    }

    #[test]
    fn scheme_default_port_is_not_inferred() {
        assert_eq!(
            resolve(Some("http://hub.example"), None, None).unwrap(),
            addr("hub.example", DEFAULT_PORT)
        );
        assert_eq!(
            resolve(Some("http://hub.example:80"), None, None).unwrap(),
            addr("hub.example", 80)
        );
    }

    #[test]
    fn ip_addresses() {
        assert_eq!(
            resolve(Some("10.0.0.5:9000"), None, None).unwrap(),
            addr("10.0.0.5", 9000)
        );
        let v6 = resolve(Some("[::1]:9000"), None, None).unwrap();
        assert_eq!(v6, addr("::1", 9000));
        assert_eq!(v6.to_string(), "[::1]:9000");
    }

    #[test]
    fn no_host_is_error() {
        assert_eq!(resolve(None, None, None), Err(AddressError::HostnameRequired));
        assert_eq!(resolve(Some("  "), None, Some(80)), Err(AddressError::HostnameRequired));
        assert_eq!(resolve(Some(":9000"), None, None), Err(AddressError::HostnameRequired));
    }

    #[test]
    fn port_only_address_with_host_override() {
        assert_eq!(
            resolve(Some(":9000"), Some("hub.example"), None).unwrap(),
            addr("hub.example", 9000)
        );
    }

    #[test]
    fn out_of_range_port_override() {
        assert_eq!(
            resolve(Some("host"), None, Some(70000)),
            Err(AddressError::InvalidPort(70000))
        );
        assert_eq!(
            resolve(Some("host"), None, Some(0)),
            Err(AddressError::InvalidPort(0))
        );
    }

    #[test]
    fn malformed_address() {
        assert!(matches!(
            resolve(Some("host:70000"), None, None),
            Err(AddressError::InvalidFormat(_))
        ));
        assert!(matches!(
            resolve(Some("host:abc"), None, None),
            Err(AddressError::InvalidFormat(_))
        ));
    }

    #[test]
    fn http_url_composition() {
        assert_eq!(addr("hub.example", 2468).http_url(false), "http://hub.example:2468");
        assert_eq!(addr("::1", 443).http_url(true), "https://[::1]:443");
    }
}
