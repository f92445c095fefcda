//! IP address validation and classification

use crate::error::{GeoError, Result};
use ipnetwork::IpNetwork;
use once_cell::sync::Lazy;
use std::net::IpAddr;

/// RFC1918, loopback and IPv6 unique-local ranges
static PRIVATE_NETWORKS: Lazy<Vec<IpNetwork>> = Lazy::new(|| {
    [
        "10.0.0.0/8",
        "172.16.0.0/12",
        "192.168.0.0/16",
        "127.0.0.0/8",
        "::1/128",
        "fc00::/7",
    ]
    .iter()
    .filter_map(|cidr| cidr.parse().ok())
    .collect()
});

/// Check that `ip` is a well-formed address.
///
/// An empty input means no check was requested and passes.
pub fn validate(ip: &str) -> Result<()> {
    if ip.is_empty() {
        return Ok(());
    }
    parse(ip).map(|_| ())
}

/// Parse an address, reporting the offending input on failure.
///
/// Surrounding whitespace is rejected rather than trimmed.
pub fn parse(ip: &str) -> Result<IpAddr> {
    ip.parse::<IpAddr>()
        .map_err(|_| GeoError::InvalidFormat(ip.to_string()))
}

/// Whether `ip` is private or loopback. Malformed input propagates `InvalidFormat`.
pub fn is_private(ip: &str) -> Result<bool> {
    Ok(is_private_addr(parse(ip)?))
}

/// IPv4-mapped IPv6 addresses are checked against the IPv4 ranges
pub fn is_private_addr(ip: IpAddr) -> bool {
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        v4 => v4,
    };
    PRIVATE_NETWORKS.iter().any(|net| net.contains(ip))
}
