//! Hookshot Web Server - GitHub webhook receiver.
//!
//! Mounts the webhook router at the configured path, answers `ping` with
//! `Pong` and acknowledges every other configured event after its signature
//! has been verified.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::routing::get;
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hookshot::web::{accept_event, health, ping};
use hookshot::{Config, Router};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        webhook_path = %config.webhook_path,
        secret_configured = !config.secret.is_empty(),
        max_body_bytes = config.max_body_bytes,
        set_calculated_signature_header = config.set_calculated_signature_header,
        "config_loaded"
    );

    let hooks = build_hooks(&config);
    info!(events = ?hooks.events(), "webhook_routes_registered");

    // Build the app
    let app = axum::Router::new()
        .route("/health", get(health))
        .route_service(&config.webhook_path, hooks)
        .layer(TraceLayer::new_for_http());

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Register `ping` plus every configured event on a router built from `config`.
fn build_hooks(config: &Config) -> Router {
    let mut hooks = Router::from_config(config);
    hooks.handle_fn("ping", ping);

    for event in config.events.iter().filter(|e| e.as_str() != "ping") {
        hooks.handle_fn(event.as_str(), accept_event);
    }

    hooks
}

/// Create a future that completes when a shutdown signal is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
