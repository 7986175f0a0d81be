use axum::http::HeaderMap;
use std::net::SocketAddr;

/// Extract the client address for logging and rate limiting.
///
/// Takes the first x-forwarded-for entry when present, otherwise the peer
/// address. In production the reverse proxy in front of the gateway must set
/// x-forwarded-for and strip caller-supplied values.
pub fn extract_client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| peer.map(|p| p.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwarded_header_wins_over_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.7, 10.0.0.1".parse().unwrap());
        let peer: SocketAddr = "127.0.0.1:9999".parse().unwrap();
        assert_eq!(extract_client_ip(&headers, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_falls_back_to_peer_address() {
        let peer: SocketAddr = "192.0.2.5:1234".parse().unwrap();
        assert_eq!(extract_client_ip(&HeaderMap::new(), Some(peer)), "192.0.2.5");
    }

    #[test]
    fn test_unknown_without_any_source() {
        assert_eq!(extract_client_ip(&HeaderMap::new(), None), "unknown");
    }
}
