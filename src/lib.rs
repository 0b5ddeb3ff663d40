//! Proxy Judge - server-side proxy anonymity detection
//!
//! Judges, from the receiving end of an HTTP request, whether the client
//! sits behind a proxy and how much that proxy reveals:
//! - Forwarding-chain normalization against trusted networks and gateways
//! - Proxy-declaring header and real-IP exposure scans
//! - Reverse hostname inspection of the connecting address
//! - Four-tier anonymity classification
//!
//! Also ships the companion-side reachability prober.

pub mod config;
pub mod error;
pub mod judge;
pub mod probe;
pub mod server;
pub mod trust;
