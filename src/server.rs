//! TCP server with connection handling
//!
//! Responsibilities:
//! - Accept TCP connections
//! - HTTP/1.1 parsing via hyper
//! - Spawn per-connection tasks
//! - Build the inbound signal and run the judgement engine
//! - Serialize the judgement as the JSON response

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::{JudgeError, Result};
use crate::judge::{InboundSignal, Judge};

/// Form field the probing client uses to submit its own address
const REAL_IP_FIELD: &str = "real-ip";

/// Judge server: accepts probe requests on any path and answers each with
/// one JSON judgement.
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    judge: Arc<Judge>,
}

impl Server {
    pub async fn bind(addr: SocketAddr, judge: Judge) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| JudgeError::Bind { addr, source: e })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|e| JudgeError::Config(format!("Failed to get local address: {}", e)))?;

        info!(%actual_addr, "Server bound successfully");

        Ok(Self {
            listener,
            addr: actual_addr,
            judge: Arc::new(judge),
        })
    }

    pub async fn run(self) -> Result<()> {
        info!(addr = %self.addr, "Starting judge server");

        loop {
            let (stream, remote_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(%e, "Failed to accept connection");
                    continue;
                }
            };

            let io = TokioIo::new(stream);
            let judge = self.judge.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    handle_request(req, remote_addr, judge.clone())
                });
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(%remote_addr, %e, "Connection error");
                }
            });
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Handle a single probe request
///
/// Any method and path are accepted; the claimed real IP is taken from the
/// `real-ip` field of the form body or query string. Malformed input
/// degrades to an empty claim instead of failing the request.
async fn handle_request(
    req: Request<Incoming>,
    remote_addr: SocketAddr,
    judge: Arc<Judge>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let uri = req.uri().clone();

    info!(%remote_addr, %method, %uri, "Request received");

    let (parts, body) = req.into_parts();
    let body_bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(%remote_addr, %e, "Failed to read request body");
            Bytes::new()
        }
    };

    let claimed_real_ip = claimed_real_ip(&body_bytes, uri.query());

    let mut signal = InboundSignal {
        headers: parts.headers,
        claimed_real_ip,
        remote_addr,
    };

    let judgement = judge.analyze(&mut signal).await;

    let response = match serde_json::to_vec(&judgement) {
        Ok(encoded) => {
            info!(%remote_addr, anon_type = judgement.anon_type, "http response");
            Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(encoded)))
                .unwrap()
        }
        Err(e) => {
            error!(%remote_addr, %e, "Judgement encoding failed");
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("Content-Type", "text/plain")
                .body(Full::new(Bytes::from("Error on judgement encoding")))
                .unwrap()
        }
    };

    Ok(response)
}

/// Claimed real IP from the form body, falling back to the query string
fn claimed_real_ip(body: &[u8], query: Option<&str>) -> String {
    if let Some(value) = form_field(body, REAL_IP_FIELD) {
        return value;
    }
    if let Some(query) = query {
        if let Some(value) = form_field(query.as_bytes(), REAL_IP_FIELD) {
            return value;
        }
    }
    String::new()
}

fn form_field(encoded: &[u8], field: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = serde_urlencoded::from_bytes(encoded).ok()?;
    pairs
        .into_iter()
        .find(|(name, _)| name == field)
        .map(|(_, value)| value)
}
