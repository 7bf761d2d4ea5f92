//! hopgate: SSRF-guarded HTTP forwarding gateway
//!
//! Fetches `?url=<target>` on the caller's behalf and relays the upstream
//! status and body, with permissive CORS. Targets resolving to loopback,
//! private, link-local or otherwise reserved addresses are refused.

mod client;
mod config;
mod server;

use anyhow::{Context, Result};
use hopgate_guard::{DnsResolver, Gatekeeper};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::client::HttpClient;
use crate::config::GatewayConfig;
use crate::server::AppState;

// Use mimalloc as the global allocator for reduced memory fragmentation
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hopgate=info,hopgate_guard=info,tower_http=info".into()),
        )
        .init();

    let config = GatewayConfig::from_env();
    config.validate()?;

    let resolver = DnsResolver::new(config.dns_config());
    let state = Arc::new(AppState {
        gatekeeper: Gatekeeper::new(resolver, config.resolve_timeout),
        forwarder: HttpClient::new(config.http_client_config()),
    });

    let app = server::router(state, config.max_request_body);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listen on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
