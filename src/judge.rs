//! Judgement engine
//!
//! Inspects one inbound probe request and decides how much a proxy in front
//! of the client reveals:
//! - reverse hostname of the connecting IP, scanned for proxy naming
//! - forwarding chain, normalized against trusted networks and gateways
//! - claimed real IP searched verbatim across header values
//! - known proxy-declaring header names
//!
//! The two resulting booleans (real IP exposed, proxy usage evidenced) map
//! onto four anonymity tiers.

pub mod headers;
pub mod reverse;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use hyper::HeaderMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::trust::{TrustedGateways, TrustedNetworkRegistry};
use self::reverse::ReverseResolver;

/// Edge-supplied country header, honored only under CDN trust
pub const COUNTRY_HEADER: &str = "cf-ipcountry";
/// Edge-supplied true client address, honored only under CDN trust
pub const CLIENT_IP_HEADER: &str = "cf-connecting-ip";

/// The slice of an inbound request the engine judges
///
/// Built once per request by the HTTP layer and discarded with the response.
/// The engine only ever mutates the forwarding-chain header.
pub struct InboundSignal {
    pub headers: HeaderMap,
    /// Client-submitted IP from the `real-ip` form field, or empty
    pub claimed_real_ip: String,
    pub remote_addr: SocketAddr,
}

/// Judgement handed back to the probing client
///
/// `anon_type` values:
/// - 0: real IP known, proxy usage known
/// - 1: real IP known, proxy usage unknown
/// - 2: real IP unknown, proxy usage known
/// - 3: real IP unknown, proxy usage unknown
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgement {
    pub anon_type: u8,
    pub messages: Vec<String>,
    pub country: String,
    pub real_ip: String,
    pub remote_ip: String,
}

/// Reduce the two evidence booleans to an anonymity tier
pub fn classify(shows_real_ip: bool, shows_proxy_usage: bool) -> u8 {
    match (shows_real_ip, shows_proxy_usage) {
        (true, true) => 0,
        (true, false) => 1,
        (false, true) => 2,
        (false, false) => 3,
    }
}

/// Per-process judgement engine shared across request handlers
///
/// Everything in here is immutable after construction, so handlers read
/// it concurrently without locking.
pub struct Judge {
    cdn_trust: bool,
    registry: Arc<TrustedNetworkRegistry>,
    gateways: TrustedGateways,
    resolver: Arc<dyn ReverseResolver>,
}

impl Judge {
    pub fn new(
        cdn_trust: bool,
        registry: TrustedNetworkRegistry,
        gateways: TrustedGateways,
        resolver: Arc<dyn ReverseResolver>,
    ) -> Self {
        Self {
            cdn_trust,
            registry: Arc::new(registry),
            gateways,
            resolver,
        }
    }

    /// Judge one request
    ///
    /// Pipeline order matters: reverse lookup first, then forwarding-chain
    /// normalization, then the header scans over the normalized map. Message
    /// order in the output follows this order.
    pub async fn analyze(&self, signal: &mut InboundSignal) -> Judgement {
        self.log_unknown_headers(&signal.headers);

        let mut shows_real_ip = false;
        let mut shows_proxy_usage = false;
        let mut messages = Vec::new();

        let country = if self.cdn_trust {
            header_str(&signal.headers, COUNTRY_HEADER)
        } else {
            String::new()
        };

        let real_ip = signal.claimed_real_ip.clone();
        let remote_ip = self.observed_remote_ip(signal);

        let msgs = reverse::check_reverse(self.resolver.as_ref(), remote_ip).await;
        if !msgs.is_empty() {
            shows_proxy_usage = true;
            messages.extend(msgs);
        }

        headers::normalize_forwarded_chain(
            &mut signal.headers,
            self.cdn_trust,
            &self.registry,
            &self.gateways,
        );

        if !real_ip.is_empty() {
            let msgs = headers::real_ip_in_headers(&signal.headers, &real_ip);
            if !msgs.is_empty() {
                shows_real_ip = true;
                messages.extend(msgs);
            }
        }

        let msgs = headers::proxy_marker_headers(&signal.headers);
        if !msgs.is_empty() {
            shows_proxy_usage = true;
            messages.extend(msgs);
        }

        let anon_type = classify(shows_real_ip, shows_proxy_usage);
        debug!(shows_real_ip, shows_proxy_usage, anon_type, "judgement finished");

        Judgement {
            anon_type,
            messages,
            country,
            real_ip,
            remote_ip: remote_ip.to_string(),
        }
    }

    /// The connection IP, replaced by the edge-supplied client address when
    /// CDN trust is enabled and the header value parses as an IP.
    fn observed_remote_ip(&self, signal: &InboundSignal) -> IpAddr {
        let mut remote_ip = signal.remote_addr.ip();
        if self.cdn_trust {
            let claimed = header_str(&signal.headers, CLIENT_IP_HEADER);
            if let Ok(ip) = claimed.parse::<IpAddr>() {
                remote_ip = ip;
            }
        }
        remote_ip
    }

    /// Surface headers outside the known-benign set at debug level; new
    /// proxy software announces itself through headers we have not
    /// catalogued yet.
    fn log_unknown_headers(&self, headers: &HeaderMap) {
        for (name, value) in headers {
            if KNOWN_HEADERS.contains(&name.as_str()) {
                continue;
            }
            debug!(header_key = %name, header_value = ?value, "unknown header");
        }
    }
}

fn header_str(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

/// Headers that carry no diagnostic value when logging unknown traffic
const KNOWN_HEADERS: [&str; 20] = [
    "host",
    "connection",
    "accept",
    "accept-encoding",
    "accept-language",
    "cache-control",
    "content-type",
    "content-length",
    "cookie",
    "dnt",
    "upgrade-insecure-requests",
    "user-agent",
    "via",
    "x-forwarded-for",
    "x-forwarded-proto",
    "x-proxy-id",
    "cf-ipcountry",
    "cf-ray",
    "cf-connecting-ip",
    "cf-visitor",
];
