use chrono::Local;
use std::net::SocketAddr;
use tokio_tungstenite::tungstenite::http::HeaderMap;

// Current local time, e.g. "3:04:05 PM"
pub fn local_time_string() -> String {
    Local::now().format("%-I:%M:%S %p").to_string()
}

// Best guess at the client's address when running behind a proxy
pub fn client_ip(headers: &HeaderMap, peer: SocketAddr) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(ip) = header("true-client-ip") {
        return ip.to_string();
    }

    if let Some(forwarded) = header("x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next() {
            return first.trim().to_string();
        }
    }

    peer.ip().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_tungstenite::tungstenite::http::HeaderValue;

    fn peer() -> SocketAddr {
        "10.0.0.9:51000".parse().unwrap()
    }

    #[test]
    fn test_local_time_format() {
        let time = local_time_string();
        assert!(time.ends_with("AM") || time.ends_with("PM"));
        assert_eq!(time.matches(':').count(), 2);
    }

    #[test]
    fn test_client_ip_falls_back_to_peer() {
        assert_eq!(client_ip(&HeaderMap::new(), peer()), "10.0.0.9");
    }

    #[test]
    fn test_client_ip_prefers_true_client_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("true-client-ip", HeaderValue::from_static("203.0.113.5"));
        headers.insert("x-forwarded-for", HeaderValue::from_static("198.51.100.1"));
        assert_eq!(client_ip(&headers, peer()), "203.0.113.5");
    }

    #[test]
    fn test_client_ip_uses_first_forwarded_entry() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.1, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, peer()), "198.51.100.1");
    }
}
