//! Proxy Judge - entry point

use std::net::SocketAddr;
use std::sync::Arc;

use proxy_judge::config::Config;
use proxy_judge::judge::reverse::DnsReverseResolver;
use proxy_judge::judge::Judge;
use proxy_judge::server::Server;
use proxy_judge::trust::{cdn, TrustedGateways, TrustedNetworkRegistry};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;

    let max_level = if config.debug_enabled {
        Level::DEBUG
    } else {
        Level::INFO
    };
    FmtSubscriber::builder()
        .with_max_level(max_level)
        .with_target(false)
        .init();

    info!(
        cdn_trust = config.trust.cdn_trust_enabled,
        gateways = config.trust.trusted_gateways.len(),
        "Starting proxy judge"
    );

    let registry = if config.trust.cdn_trust_enabled {
        let registry = cdn::load().await;
        info!(ranges = registry.len(), "Trusted cdn ranges loaded");
        registry
    } else {
        TrustedNetworkRegistry::empty()
    };

    let judge = Judge::new(
        config.trust.cdn_trust_enabled,
        registry,
        TrustedGateways::new(config.trust.trusted_gateways),
        Arc::new(DnsReverseResolver::new(config.reverse_dns.lookup_timeout)),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let server = Server::bind(addr, judge).await?;
    server.run().await?;

    Ok(())
}
