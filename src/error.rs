//! Unified error types for the proxy judge

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JudgeError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Trusted range download failed: {0}")]
    RangeDownload(String),
}

pub type Result<T> = std::result::Result<T, JudgeError>;
