use axum::{
    extract::ConnectInfo,
    http::{Extensions, HeaderMap},
};
use ipnetwork::IpNetwork;
use std::net::{IpAddr, SocketAddr};

/// Resolve the address a request should be attributed to
///
/// Priority:
/// 1. Rightmost `X-Forwarded-For` entry, only when the peer is a trusted proxy
/// 2. Connection remote address
pub fn client_ip(
    headers: &HeaderMap,
    extensions: &Extensions,
    trusted_proxies: &[IpNetwork],
) -> Option<IpAddr> {
    let peer_ip = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip());

    match peer_ip {
        Some(peer) if is_trusted(trusted_proxies, peer) => forwarded_for(headers).or(Some(peer)),
        other => other,
    }
}

/// The address appended by the nearest proxy
fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.rsplit(',').next())
        .and_then(|s| s.trim().parse::<IpAddr>().ok())
}

fn is_trusted(trusted_proxies: &[IpNetwork], ip: IpAddr) -> bool {
    trusted_proxies.iter().any(|network| network.contains(ip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use std::str::FromStr;

    fn extensions_from(peer: &str) -> Extensions {
        let mut extensions = Extensions::new();
        extensions.insert(ConnectInfo(SocketAddr::new(peer.parse().unwrap(), 40000)));
        extensions
    }

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(value).unwrap());
        headers
    }

    fn loopback_only() -> Vec<IpNetwork> {
        vec![IpNetwork::from_str("127.0.0.0/8").unwrap()]
    }

    #[test]
    fn test_direct_connection() {
        let ip = client_ip(&HeaderMap::new(), &extensions_from("203.0.113.9"), &loopback_only());
        assert_eq!(ip, Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_header_from_trusted_proxy() {
        let ip = client_ip(
            &forwarded("198.51.100.1, 203.0.113.7"),
            &extensions_from("127.0.0.1"),
            &loopback_only(),
        );
        assert_eq!(ip, Some("203.0.113.7".parse().unwrap()));
    }

    #[test]
    fn test_forwarded_header_from_untrusted_peer_is_ignored() {
        let ip = client_ip(
            &forwarded("198.51.100.1"),
            &extensions_from("203.0.113.9"),
            &loopback_only(),
        );
        assert_eq!(ip, Some("203.0.113.9".parse().unwrap()));
    }

    #[test]
    fn test_garbage_forwarded_header_falls_back_to_peer() {
        let ip = client_ip(&forwarded("not-an-ip"), &extensions_from("127.0.0.1"), &loopback_only());
        assert_eq!(ip, Some("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_no_connect_info() {
        assert_eq!(client_ip(&forwarded("198.51.100.1"), &Extensions::new(), &loopback_only()), None);
    }
}
