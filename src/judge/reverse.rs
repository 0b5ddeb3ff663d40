//! Reverse hostname scanning
//!
//! Proxy and cache appliances commonly advertise themselves in their PTR
//! records (`proxy1.company.com`, `cache3.isp.net`). The scanner resolves
//! the connecting IP and looks for those naming conventions.
//!
//! Resolution goes through the [`ReverseResolver`] trait so the engine is
//! testable without touching real DNS; [`DnsReverseResolver`] is the
//! production implementation.

use std::net::IpAddr;
use std::time::Duration;

use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use tracing::{info, warn};

/// Infrastructure naming substrings, in fixed scan order
pub const HOSTNAME_MARKERS: [&str; 3] = ["cache", "squid", "proxy"];

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("reverse lookup failed: {0}")]
    Failed(String),
    #[error("reverse lookup timed out")]
    TimedOut,
}

/// PTR lookup capability injected into the judge
#[async_trait::async_trait]
pub trait ReverseResolver: Send + Sync {
    /// Resolve an IP to its PTR hostnames
    async fn lookup(&self, ip: IpAddr) -> Result<Vec<String>, LookupError>;
}

/// Production resolver backed by hickory with a per-lookup timeout
///
/// The timeout bounds the whole lookup so a stalled resolver cannot stall
/// request handling; a timed-out lookup is final for that request.
pub struct DnsReverseResolver {
    resolver: TokioAsyncResolver,
    timeout: Duration,
}

impl DnsReverseResolver {
    pub fn new(timeout: Duration) -> Self {
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default()),
            timeout,
        }
    }
}

#[async_trait::async_trait]
impl ReverseResolver for DnsReverseResolver {
    async fn lookup(&self, ip: IpAddr) -> Result<Vec<String>, LookupError> {
        let lookup = tokio::time::timeout(self.timeout, self.resolver.reverse_lookup(ip))
            .await
            .map_err(|_| LookupError::TimedOut)?
            .map_err(|e| LookupError::Failed(e.to_string()))?;

        Ok(lookup.iter().map(|name| name.to_utf8()).collect())
    }
}

/// Scan the reverse hostnames of `ip` for infrastructure markers
///
/// Lookup failure is indistinguishable from "no markers" in the result (it
/// only shows in the logs); judgement always continues.
pub async fn check_reverse(resolver: &dyn ReverseResolver, ip: IpAddr) -> Vec<String> {
    let mut res = Vec::new();
    let names = match resolver.lookup(ip).await {
        Ok(names) => names,
        Err(e) => {
            warn!(%ip, error = %e, "error on ip reversal");
            return res;
        }
    };

    let full_names = names.join(",");
    for mark in HOSTNAME_MARKERS {
        if full_names.contains(mark) {
            info!(mark, resolved_hostname = full_names, "found host marker");
            res.push(format!("Hostname contains {}", mark));
        }
    }
    res
}

/// Resolver returning a fixed hostname list (for testing)
pub struct StaticResolver {
    names: Vec<String>,
}

impl StaticResolver {
    pub fn new(names: Vec<String>) -> Self {
        Self { names }
    }
}

#[async_trait::async_trait]
impl ReverseResolver for StaticResolver {
    async fn lookup(&self, _ip: IpAddr) -> Result<Vec<String>, LookupError> {
        Ok(self.names.clone())
    }
}

/// Resolver that always fails (for testing)
pub struct FailingResolver;

#[async_trait::async_trait]
impl ReverseResolver for FailingResolver {
    async fn lookup(&self, ip: IpAddr) -> Result<Vec<String>, LookupError> {
        Err(LookupError::Failed(format!("no PTR record for {}", ip)))
    }
}
