// crates/server/src/main.rs
//! tubefetch server binary.
//!
//! Reads configuration from the environment, makes sure the downloads
//! directory exists, then serves until Ctrl-C.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use tubefetch_server::artifacts::RETENTION_SWEEP_INTERVAL;
use tubefetch_server::{create_app, init_metrics, AppState, ServerConfig};

const DEFAULT_LOG_FILTER: &str = "warn,tubefetch_server=info,tubefetch_core=info";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .compact()
        .init();

    init_metrics();

    let config = ServerConfig::from_env();
    tokio::fs::create_dir_all(&config.downloads_dir)
        .await
        .with_context(|| {
            format!(
                "failed to create downloads directory {}",
                config.downloads_dir.display()
            )
        })?;

    if !config.worker.is_available().await {
        tracing::warn!(
            worker = %config.worker.program,
            "download worker not found; downloads will fail until it is installed"
        );
    }

    let addr = config.socket_addr();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        downloads_dir = %config.downloads_dir.display(),
        worker = %config.worker.program,
        "starting tubefetch"
    );

    let retention = config.retention;
    let state = AppState::new(config);
    if retention.is_zero() {
        tracing::info!("retention sweep disabled");
    } else {
        Arc::clone(&state.artifacts).spawn_retention_sweep(retention, RETENTION_SWEEP_INTERVAL);
    }
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}
