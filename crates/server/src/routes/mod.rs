//! HTTP and WebSocket route handlers.

pub mod downloads;
pub mod health;
pub mod info;
pub mod metrics;
pub mod ws;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router.
///
/// Routes:
/// - GET    /api/health              - Health check and worker availability
/// - POST   /api/info                - Video metadata and format menu
/// - POST   /api/download            - Start a download job
/// - GET    /api/download/{id}/status - Job record
/// - GET    /api/download/{id}/file  - Stream the finished file
/// - DELETE /api/download/{id}       - Cancel an in-flight job
/// - GET    /api/downloads           - All job records
/// - GET    /ws                      - Progress event stream (WebSocket)
/// - GET    /metrics                 - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", health::router())
        .nest("/api", info::router())
        .nest("/api", downloads::router())
        .merge(ws::router())
        .merge(metrics::router())
        .with_state(state)
}
