// Main entry point - Dependency injection, poller startup and server setup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use anyhow::Context;
use axum::{
    routing::{get, put},
    Router,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::sync::watch;
use tower_http::{compression::CompressionLayer, trace::TraceLayer};
use tracing_subscriber::EnvFilter;

use crate::application::dashboard_service::DashboardService;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::dozemate_repository::DozemateRepository;
use crate::infrastructure::session::SessionTokenSource;
use crate::infrastructure::snapshot_store::SnapshotStore;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    health_check, history, latest_readings, live_state, live_stream, live_window, metric_view,
    set_auto_scroll, set_mode,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let app_config = load_app_config().context("Failed to load configuration")?;

    // Initialize tracing; RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&app_config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Create repository (infrastructure layer)
    let session = SessionTokenSource::from_settings(
        app_config.session.token.clone(),
        app_config.session.token_file.clone(),
    );
    let repository = Arc::new(DozemateRepository::new(
        app_config.api.base_url.clone(),
        session,
        Duration::from_secs(app_config.api.timeout_secs),
    )?);
    let snapshots = app_config
        .snapshot
        .path
        .clone()
        .map(|path| Arc::new(SnapshotStore::new(path)));

    // Create services (application layer)
    let dashboard_service = Arc::new(DashboardService::new(
        repository,
        app_config.poller_settings()?,
        app_config.polling.auto_scroll,
        snapshots,
    ));
    dashboard_service.hydrate().await;
    dashboard_service.start(app_config.polling.mode).await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let state = Arc::new(AppState {
        dashboard_service: dashboard_service.clone(),
        shutdown: shutdown_rx,
    });

    // Build router (presentation layer)
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/live", get(live_state))
        .route("/live/latest", get(latest_readings))
        .route("/live/window", get(live_window))
        .route("/live/metrics/:metric", get(metric_view))
        .route("/live/stream", get(live_stream))
        .route("/history", get(history))
        .route("/mode", put(set_mode))
        .route("/auto-scroll", put(set_auto_scroll))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = app_config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid server.bind address: {}", app_config.server.bind))?;
    tracing::info!("Starting dozemate-telemetry on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await?;

    dashboard_service.stop().await;
    if let Err(e) = dashboard_service.persist_snapshot().await {
        tracing::warn!("Failed to write final snapshot: {:#}", e);
    }
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal(streams: watch::Sender<bool>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
    let _ = streams.send(true);
}
