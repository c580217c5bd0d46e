//! Client key extraction.

use axum::http::HeaderMap;
use std::net::{IpAddr, SocketAddr};

use crate::config::ClientIpSource;

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub const X_REAL_IP: &str = "x-real-ip";

/// Fold IPv4-mapped IPv6 addresses back to IPv4 so one client has one key.
pub fn normalize_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

fn header_ip(headers: &HeaderMap, name: &str) -> Option<IpAddr> {
    let value = headers.get(name)?.to_str().ok()?;
    value.split(',').next()?.trim().parse().ok()
}

/// Derive the client key for a request, falling back to the peer address.
pub fn client_key(source: ClientIpSource, peer: SocketAddr, headers: &HeaderMap) -> String {
    let ip = match source {
        ClientIpSource::Peer => None,
        ClientIpSource::XForwardedFor => header_ip(headers, X_FORWARDED_FOR),
        ClientIpSource::XRealIp => header_ip(headers, X_REAL_IP),
    }
    .unwrap_or_else(|| peer.ip());

    normalize_ip(ip).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn peer() -> SocketAddr {
        "192.0.2.10:54321".parse().unwrap()
    }

    #[test]
    fn test_peer_ignores_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static("203.0.113.7"));
        assert_eq!(client_key(ClientIpSource::Peer, peer(), &headers), "192.0.2.10");
    }

    #[test]
    fn test_forwarded_for_takes_first_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(X_FORWARDED_FOR, HeaderValue::from_static(" 203.0.113.7 , 10.0.0.1"));
        assert_eq!(client_key(ClientIpSource::XForwardedFor, peer(), &headers), "203.0.113.7");
    }

    #[test]
    fn test_bad_header_falls_back_to_peer() {
        let mut headers = HeaderMap::new();
        headers.insert(X_REAL_IP, HeaderValue::from_static("garbage"));
        assert_eq!(client_key(ClientIpSource::XRealIp, peer(), &headers), "192.0.2.10");
        assert_eq!(client_key(ClientIpSource::XForwardedFor, peer(), &HeaderMap::new()), "192.0.2.10");
    }

    #[test]
    fn test_mapped_ipv6_normalized() {
        let peer: SocketAddr = "[::ffff:198.51.100.4]:80".parse().unwrap();
        assert_eq!(client_key(ClientIpSource::Peer, peer, &HeaderMap::new()), "198.51.100.4");

        let v6: SocketAddr = "[2001:db8::1]:80".parse().unwrap();
        assert_eq!(client_key(ClientIpSource::Peer, v6, &HeaderMap::new()), "2001:db8::1");
    }
}
