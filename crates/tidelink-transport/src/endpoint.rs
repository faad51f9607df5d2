//! Endpoint parsing.
//!
//! Only IP literals are accepted. Resolving a host name would touch the
//! network, and a malformed address must fail before anything does.

use std::net::{IpAddr, SocketAddr};

use crate::TransportError;

/// Parses an `"ip:port"` string into a socket address.
///
/// The string must split on `:` into exactly two non-blank parts, the
/// port must fit in a `u16` and the host must be an IP literal. IPv6
/// hosts are therefore only reachable through [`endpoint`].
///
/// # Errors
/// Returns [`TransportError::AddressParse`] for any malformed input.
///
/// # Example
///
/// ```rust
/// use tidelink_transport::parse_endpoint;
///
/// let addr = parse_endpoint("127.0.0.1:9000").unwrap();
/// assert_eq!(addr.port(), 9000);
/// assert!(parse_endpoint("127.0.0.1").is_err());
/// ```
pub fn parse_endpoint(ip_with_port: &str) -> Result<SocketAddr, TransportError> {
    let members: Vec<&str> = ip_with_port.split(':').collect();
    let [host, port] = members.as_slice() else {
        return Err(TransportError::AddressParse(format!(
            "expected \"ip:port\", got {ip_with_port:?}"
        )));
    };
    if host.trim().is_empty() || port.trim().is_empty() {
        return Err(TransportError::AddressParse(format!(
            "blank host or port in {ip_with_port:?}"
        )));
    }
    let port: u16 = port.trim().parse().map_err(|_| {
        TransportError::AddressParse(format!("invalid port {port:?}"))
    })?;
    endpoint(host.trim(), port)
}

/// Builds a socket address from an IP literal and a port.
///
/// # Errors
/// Returns [`TransportError::AddressParse`] if `host` is not an IPv4 or
/// IPv6 literal.
pub fn endpoint(host: &str, port: u16) -> Result<SocketAddr, TransportError> {
    let ip: IpAddr = host.parse().map_err(|_| {
        TransportError::AddressParse(format!("invalid ip address {host:?}"))
    })?;
    Ok(SocketAddr::new(ip, port))
}
