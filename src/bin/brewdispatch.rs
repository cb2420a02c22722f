//! brewdispatch: HTTP dispatch gateway for the brewery catalog service.
//!
//! Accepts REST requests, dispatches each as a streaming gRPC call against
//! the catalog backend, and aggregates the stream into a JSON response.
//!
//! ## Configuration
//!
//! Required (startup fails fast without them):
//! - PORT: HTTP listen port
//! - NETWORK: backend host; the gateway dials NETWORK:50051 by default
//! - TLS_BYPASS: must be truthy; the backend channel is plaintext
//!
//! Optional:
//! - BREWDISPATCH__BACKEND__PORT: backend gRPC port (default: 50051)
//! - BREWDISPATCH__BACKEND__REQUEST_TIMEOUT_SECS: per-request deadline (default: 10)
//! - BREWDISPATCH__HTTP__SHUTDOWN_GRACE_SECS: drain deadline (default: 30)
//! - BREWDISPATCH_LOG: log filter (default: "info")
//! - allowed origins via `http.allowed_origins` in config.yaml (default: any)

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{error, info};

use brewdispatch::bootstrap::init_tracing;
use brewdispatch::config::Config;
use brewdispatch::gateway::{router, AppState};
use brewdispatch::grpc::{open_channel, BreweryDispatch};
use brewdispatch::health::HealthState;
use brewdispatch::lifecycle::{listen_for_interrupt, serve, Shutdown};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    info!("Starting brewdispatch gateway");

    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    let listen_addr = config.listen_addr()?;
    let backend_addr = config.backend_addr()?;

    info!(
        listen = %listen_addr,
        backend = %backend_addr,
        request_timeout = config.backend.request_timeout_secs,
        "starting up with these settings"
    );

    let channel = open_channel(&backend_addr)?;
    let dispatch = BreweryDispatch::new(
        channel,
        Duration::from_secs(config.backend.request_timeout_secs),
    );

    let health = Arc::new(HealthState::new());
    let app = router(
        AppState {
            dispatch,
            health: health.clone(),
        },
        &config.http.allowed_origins,
    );

    let listener = TcpListener::bind(&listen_addr).await.map_err(|e| {
        error!(address = %listen_addr, error = %e, "failed to bind listener");
        e
    })?;

    let shutdown = Shutdown::new();
    listen_for_interrupt(shutdown.clone());

    serve(
        listener,
        app,
        health,
        shutdown,
        Duration::from_secs(config.http.shutdown_grace_secs),
    )
    .await?;

    info!("Server stopped");
    Ok(())
}
