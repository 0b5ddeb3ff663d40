//! Header evidence scanning and forwarding-chain normalization

use hyper::header::HeaderValue;
use hyper::HeaderMap;
use tracing::{debug, info};

use crate::trust::{TrustedGateways, TrustedNetworkRegistry};

/// The header a proxy hop uses to record upstream client addresses
pub const FORWARDED_CHAIN_HEADER: &str = "x-forwarded-for";

/// Header names a proxy may add about itself, in fixed scan order
pub const PROXY_HEADER_MARKERS: [&str; 12] = [
    "Client-Ip",
    "HTTP_CLIENT_IP",
    "FORWARDED",
    "FORWARDED-FOR",
    "FORWARDED-FOR-IP",
    "X-FORWARDED",
    "X-FORWARDED-FOR",
    "PROXY_CONNECTION",
    "Via",
    "X-Proxy-Id",
    "X-Bluecoat-Via",
    "X-Iwproxy",
];

/// One message per marker header present in the request
///
/// Output order follows the marker list, not header arrival order, so test
/// assertions stay deterministic.
pub fn proxy_marker_headers(headers: &HeaderMap) -> Vec<String> {
    let mut msg = Vec::new();
    for marker in PROXY_HEADER_MARKERS {
        if let Some(value) = headers.get(marker) {
            debug!(header_name = marker, header_value = ?value, "header marker found");
            msg.push(format!("Header [{}] is present", marker));
        }
    }
    msg
}

/// One message per header whose comma-joined values contain the claimed IP
///
/// Deliberately a substring match: `1.2.3.4` also hits inside `21.2.3.45`.
pub fn real_ip_in_headers(headers: &HeaderMap, real_ip: &str) -> Vec<String> {
    let mut msg = Vec::new();
    for name in headers.keys() {
        let joined = headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect::<Vec<_>>()
            .join(",");
        if !joined.contains(real_ip) {
            continue;
        }
        info!(header_name = %name, header_value = joined, "found real ip in headers");
        msg.push(format!("Found real ip in the header [{}]", name));
    }
    msg
}

/// Strip trusted hops out of the forwarding-chain header
///
/// Tokens are the comma-separated pieces across every occurrence of the
/// header, compared verbatim (no trimming). A token is dropped when it
/// parses as an IP inside the registry (CDN trust only) or exactly equals a
/// trusted gateway address. With no survivors the header is removed
/// entirely: no untrusted hop added it. Otherwise the survivors replace the
/// original value. Must run before the header scans.
pub fn normalize_forwarded_chain(
    headers: &mut HeaderMap,
    cdn_trust: bool,
    registry: &TrustedNetworkRegistry,
    gateways: &TrustedGateways,
) {
    let mut survivors: Vec<String> = Vec::new();
    for value in headers.get_all(FORWARDED_CHAIN_HEADER) {
        let Ok(value) = value.to_str() else {
            continue;
        };
        for token in value.split(',') {
            if cdn_trust {
                if let Ok(ip) = token.parse::<std::net::IpAddr>() {
                    if registry.contains(ip) {
                        continue;
                    }
                }
            }
            if gateways.contains(token) {
                continue;
            }
            survivors.push(token.to_string());
        }
    }

    if survivors.is_empty() {
        headers.remove(FORWARDED_CHAIN_HEADER);
    } else if let Ok(value) = HeaderValue::from_str(&survivors.join(",")) {
        headers.insert(FORWARDED_CHAIN_HEADER, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderName;

    fn header_map(entries: Vec<(&str, &str)>) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in entries {
            map.append(
                name.parse::<HeaderName>().unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_marker_scan_follows_list_order() {
        // arrival order is deliberately the reverse of the marker list
        let headers = header_map(vec![
            ("x-proxy-id", "42"),
            ("via", "1.1 gw"),
            ("client-ip", "1.2.3.4"),
        ]);

        let msgs = proxy_marker_headers(&headers);
        assert_eq!(
            msgs,
            vec![
                "Header [Client-Ip] is present",
                "Header [Via] is present",
                "Header [X-Proxy-Id] is present",
            ]
        );
    }

    #[test]
    fn test_marker_scan_one_message_per_marker() {
        let mut headers = header_map(vec![("via", "1.1 a")]);
        headers.append("via", HeaderValue::from_static("1.1 b"));

        let msgs = proxy_marker_headers(&headers);
        assert_eq!(msgs, vec!["Header [Via] is present"]);
    }

    #[test]
    fn test_marker_scan_empty_without_markers() {
        let headers = header_map(vec![("user-agent", "test"), ("accept", "*/*")]);
        assert!(proxy_marker_headers(&headers).is_empty());
    }

    #[test]
    fn test_real_ip_found_in_joined_values() {
        let headers = header_map(vec![
            ("x-custom", "prefix 198.51.100.7 suffix"),
            ("user-agent", "test"),
        ]);

        let msgs = real_ip_in_headers(&headers, "198.51.100.7");
        assert_eq!(msgs, vec!["Found real ip in the header [x-custom]"]);
    }

    #[test]
    fn test_real_ip_substring_overmatch_is_current_behavior() {
        // inherited over-match: the candidate may sit inside a longer
        // numeric value and still count as exposure
        let headers = header_map(vec![("x-custom", "21.2.3.45")]);

        let msgs = real_ip_in_headers(&headers, "1.2.3.4");
        assert_eq!(msgs, vec!["Found real ip in the header [x-custom]"]);
    }

    #[test]
    fn test_real_ip_absent() {
        let headers = header_map(vec![("x-custom", "10.0.0.1")]);
        assert!(real_ip_in_headers(&headers, "198.51.100.7").is_empty());
    }

    #[test]
    fn test_normalize_removes_header_when_all_tokens_trusted() {
        let registry = TrustedNetworkRegistry::from_lines("104.16.0.0/12");
        let gateways = TrustedGateways::new(vec!["10.0.0.1".to_string()]);
        let mut headers = header_map(vec![("x-forwarded-for", "104.16.1.1,10.0.0.1")]);

        normalize_forwarded_chain(&mut headers, true, &registry, &gateways);

        // fully trusted chain: header absent, not present-but-empty
        assert!(headers.get(FORWARDED_CHAIN_HEADER).is_none());
    }

    #[test]
    fn test_normalize_keeps_untrusted_tokens() {
        let registry = TrustedNetworkRegistry::from_lines("104.16.0.0/12");
        let gateways = TrustedGateways::new(vec!["10.0.0.1".to_string()]);
        let mut headers =
            header_map(vec![("x-forwarded-for", "104.16.1.1,203.0.113.9,10.0.0.1")]);

        normalize_forwarded_chain(&mut headers, true, &registry, &gateways);

        assert_eq!(
            headers.get(FORWARDED_CHAIN_HEADER).unwrap(),
            "203.0.113.9"
        );
    }

    #[test]
    fn test_normalize_registry_ignored_without_cdn_trust() {
        let registry = TrustedNetworkRegistry::from_lines("104.16.0.0/12");
        let gateways = TrustedGateways::default();
        let mut headers = header_map(vec![("x-forwarded-for", "104.16.1.1")]);

        normalize_forwarded_chain(&mut headers, false, &registry, &gateways);

        assert_eq!(headers.get(FORWARDED_CHAIN_HEADER).unwrap(), "104.16.1.1");
    }

    #[test]
    fn test_normalize_merges_multiple_occurrences() {
        let registry = TrustedNetworkRegistry::empty();
        let gateways = TrustedGateways::new(vec!["10.0.0.1".to_string()]);
        let mut headers = header_map(vec![("x-forwarded-for", "203.0.113.9,10.0.0.1")]);
        headers.append(
            FORWARDED_CHAIN_HEADER,
            HeaderValue::from_static("198.51.100.3"),
        );

        normalize_forwarded_chain(&mut headers, false, &registry, &gateways);

        let values: Vec<_> = headers.get_all(FORWARDED_CHAIN_HEADER).iter().collect();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0], "203.0.113.9,198.51.100.3");
    }

    #[test]
    fn test_normalize_is_idempotent_on_untrusted_chain() {
        let registry = TrustedNetworkRegistry::from_lines("104.16.0.0/12");
        let gateways = TrustedGateways::new(vec!["10.0.0.1".to_string()]);
        let mut headers = header_map(vec![("x-forwarded-for", "203.0.113.9,198.51.100.3")]);

        normalize_forwarded_chain(&mut headers, true, &registry, &gateways);
        let first = headers.get(FORWARDED_CHAIN_HEADER).unwrap().clone();

        normalize_forwarded_chain(&mut headers, true, &registry, &gateways);
        assert_eq!(headers.get(FORWARDED_CHAIN_HEADER).unwrap(), &first);
    }

    #[test]
    fn test_normalize_leaves_absent_header_absent() {
        let registry = TrustedNetworkRegistry::empty();
        let gateways = TrustedGateways::default();
        let mut headers = header_map(vec![("user-agent", "test")]);

        normalize_forwarded_chain(&mut headers, true, &registry, &gateways);

        assert!(headers.get(FORWARDED_CHAIN_HEADER).is_none());
        assert_eq!(headers.len(), 1);
    }
}
