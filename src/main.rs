use anyhow::{Context, Result};
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pulseboard::config::Config;
use pulseboard::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first
    let config = Config::load()?;

    // Initialize tracing with structured JSON logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).json();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Pulseboard starting up");
    if !config.ai_ready() {
        info!("AI endpoints disabled until both upstream credentials are set");
    }

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port)
        .parse()
        .context("Invalid bind address")?;

    let state = AppState::new(config)?;
    let app = server::app(state);

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind listener")?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {}", e);
        return;
    }
    info!("Shutdown signal received, stopping");
}
