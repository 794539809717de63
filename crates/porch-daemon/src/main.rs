//! porch-daemon entry point.
//!
//! Loads config and secrets, sets up tracing, builds the shared state and
//! serves the router. Route handlers live in `routes.rs`; shared state types
//! live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use porch_config::{load_layered_yaml, secrets, DaemonConfig};
use porch_daemon::{routes, state};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[derive(Debug, Parser)]
#[command(name = "porch-daemon", about = "Delivery confirmation OTP daemon")]
struct Args {
    /// YAML config layer; repeat to merge several (later layers override).
    #[arg(long = "config", value_name = "PATH")]
    config: Vec<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if missing.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let args = Args::parse();
    let paths: Vec<&str> = args.config.iter().map(String::as_str).collect();
    let loaded = load_layered_yaml(&paths).context("config load failed")?;
    let cfg = DaemonConfig::from_loaded(&loaded)?;
    info!(config_hash = %loaded.config_hash, layers = paths.len(), "config loaded");

    let resolved = secrets::resolve_secrets(&cfg);
    let shared = Arc::new(state::AppState::from_config(&cfg, &resolved)?);

    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));
    state::spawn_session_relay(&shared);

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&cfg.server.cors_origins));

    let addr = match bind_addr_from_env() {
        Some(addr) => addr,
        None => cfg.bind_addr()?,
    };
    info!(
        notifier_delay_ms = cfg.notifier.delay_ms,
        "porch-daemon listening on http://{}", addr
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("PORCH_DAEMON_ADDR").ok()?.parse().ok()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl-c handler failed; shutting down");
    }
    info!("shutdown requested; in-flight notifiers are dropped");
}

/// CORS from config. `*` allows any origin; otherwise an explicit list.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        let list: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| HeaderValue::from_str(o).ok())
            .collect();
        AllowOrigin::list(list)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}
