//! Outbound proxy reachability probe
//!
//! Companion-client utility: dials a candidate proxy, pushes one judge
//! request through it and reports latency, status and the decoded
//! judgement. Deliberately a plain timed-dial-and-fetch — no retries, no
//! backoff, no state machine.

use std::fmt;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::judge::Judgement;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("input string is empty")]
    EmptyAddress,

    #[error("this is not a valid ipv4 address")]
    InvalidAddress,

    #[error("invalid port")]
    InvalidPort,

    #[error("probe request failed: {0}")]
    Request(String),
}

/// Proxy protocol spoken on the candidate's port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    Http,
    Https,
    Socks5,
}

impl ProxyKind {
    fn scheme(self) -> &'static str {
        match self {
            ProxyKind::Http => "http",
            ProxyKind::Https => "https",
            ProxyKind::Socks5 => "socks5",
        }
    }
}

/// Candidate proxy endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyAddr {
    pub host: String,
    pub port: u16,
    pub kind: ProxyKind,
}

impl ProxyAddr {
    /// Parse an `a.b.c.d:port` string, defaulting to the HTTP kind
    pub fn from_ipv4_str(s: &str) -> Result<Self, ProbeError> {
        if s.is_empty() {
            return Err(ProbeError::EmptyAddress);
        }

        let (host, port) = s.split_once(':').ok_or(ProbeError::InvalidAddress)?;
        if host.parse::<std::net::Ipv4Addr>().is_err() {
            return Err(ProbeError::InvalidAddress);
        }
        if port.is_empty() || port.len() > 5 || !port.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProbeError::InvalidAddress);
        }
        let port = port.parse::<u16>().map_err(|_| ProbeError::InvalidPort)?;
        if port == 0 {
            return Err(ProbeError::InvalidPort);
        }

        Ok(Self {
            host: host.to_string(),
            port,
            kind: ProxyKind::Http,
        })
    }

    pub fn with_kind(mut self, kind: ProxyKind) -> Self {
        self.kind = kind;
        self
    }

    fn proxy_url(&self) -> String {
        format!("{}://{}:{}", self.kind.scheme(), self.host, self.port)
    }
}

impl fmt::Display for ProxyAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Probe configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// TCP dial timeout for the port-open check
    pub connect_timeout: Duration,
    /// End-to-end timeout for the judge request through the proxy
    pub download_timeout: Duration,
    /// Browser-like agent so the probe blends into ordinary traffic
    pub user_agent: String,
    /// Judge endpoint the probe is routed to
    pub judge_url: String,
}

impl ProbeConfig {
    pub fn new(judge_url: String) -> Self {
        Self {
            connect_timeout: Duration::from_secs(3),
            download_timeout: Duration::from_secs(5),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; WOW64; rv:53.0) Gecko/20100101 \
                         Firefox/53.0"
                .to_string(),
            judge_url,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Outcome of one probe
#[derive(Debug)]
pub struct ProbeResult {
    pub port_open: bool,
    pub status: Option<u16>,
    pub elapsed: Option<Duration>,
    pub judgement: Option<Judgement>,
}

impl ProbeResult {
    fn closed() -> Self {
        Self {
            port_open: false,
            status: None,
            elapsed: None,
            judgement: None,
        }
    }
}

/// One-shot prober for candidate proxies
pub struct Prober {
    config: ProbeConfig,
}

impl Prober {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }

    /// Dial the candidate and push one judge request through it
    ///
    /// A closed or unreachable port is a normal outcome, not an error. A
    /// reachable proxy that breaks the request afterwards surfaces as
    /// `ProbeError::Request`.
    pub async fn check(&self, addr: &ProxyAddr, real_ip: &str) -> Result<ProbeResult, ProbeError> {
        let dial = TcpStream::connect((addr.host.as_str(), addr.port));
        match tokio::time::timeout(self.config.connect_timeout, dial).await {
            Ok(Ok(_stream)) => {}
            Ok(Err(e)) => {
                debug!(%addr, %e, "port closed");
                return Ok(ProbeResult::closed());
            }
            Err(_) => {
                debug!(%addr, "dial timed out");
                return Ok(ProbeResult::closed());
            }
        }

        let proxy = reqwest::Proxy::all(addr.proxy_url())
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(self.config.download_timeout)
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| ProbeError::Request(e.to_string()))?;

        let start = Instant::now();
        let resp = client
            .post(&self.config.judge_url)
            .form(&[("real-ip", real_ip)])
            .send()
            .await
            .map_err(|e| ProbeError::Request(e.to_string()))?;
        let elapsed = start.elapsed();

        let status = resp.status().as_u16();
        let judgement = if resp.status().is_success() {
            resp.json::<Judgement>().await.ok()
        } else {
            None
        };

        Ok(ProbeResult {
            port_open: true,
            status: Some(status),
            elapsed: Some(elapsed),
            judgement,
        })
    }
}

/// Best-effort lookup of our own public address via api.ipify.org
///
/// Returns `None` on any failure; the caller probes with an empty claimed
/// IP in that case.
pub async fn detect_public_ip() -> Option<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(3))
        .build()
        .ok()?;

    let resp = client.get("https://api.ipify.org").send().await.ok()?;
    if !resp.status().is_success() {
        warn!(status = %resp.status(), "public ip lookup failed");
        return None;
    }
    resp.text().await.ok()
}
