//! Trusted network registry and gateway list
//!
//! Both structures are built once at startup and shared read-only across
//! request handlers. An address found in the forwarding chain that matches
//! either of them is stripped from the evidence: it was added by
//! infrastructure the operator already knows about, not by the proxy under
//! test.

pub mod cdn;

use std::net::IpAddr;

use ipnet::IpNet;
use tracing::{debug, warn};

/// Immutable set of CIDR blocks whose members are not proxy evidence
#[derive(Debug, Default)]
pub struct TrustedNetworkRegistry {
    blocks: Vec<IpNet>,
}

impl TrustedNetworkRegistry {
    /// Empty registry; every membership test returns false
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from a newline-delimited CIDR list
    ///
    /// Each line is parsed independently; a line that fails to parse is
    /// logged and skipped, never aborting construction. Blank lines are
    /// ignored.
    pub fn from_lines(lines: &str) -> Self {
        let mut blocks = Vec::new();
        for line in lines.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match line.parse::<IpNet>() {
                Ok(net) => {
                    debug!(cidr = line, "added cidr to trusted ranges");
                    blocks.push(net);
                }
                Err(e) => {
                    warn!(cidr = line, error = %e, "error on cidr parsing");
                }
            }
        }
        Self { blocks }
    }

    /// Membership is a pure union test over the blocks; no ordering or
    /// priority among them.
    pub fn contains(&self, ip: IpAddr) -> bool {
        self.blocks.iter().any(|net| net.contains(&ip))
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Operator-declared gateway addresses, compared by exact string equality
/// against forwarding-chain tokens (not CIDR membership).
#[derive(Debug, Default)]
pub struct TrustedGateways {
    addrs: Vec<String>,
}

impl TrustedGateways {
    pub fn new(addrs: Vec<String>) -> Self {
        Self { addrs }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.addrs.iter().any(|a| a == token)
    }
}
