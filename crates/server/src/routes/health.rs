// crates/server/src/routes/health.rs
//! Health check endpoint for the API.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Response for the health check endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub worker_installed: bool,
    pub message: String,
}

/// GET /api/health - Health check endpoint.
///
/// Returns server status, version, uptime and whether the download worker
/// can be launched.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let worker_installed = state.config.worker.is_available().await;
    let message = if worker_installed {
        "Server is running".to_string()
    } else {
        format!("Server is running, but `{}` is not installed", state.config.worker.program)
    };
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        worker_installed,
        message,
    })
}

/// Create the health routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health_check))
}
