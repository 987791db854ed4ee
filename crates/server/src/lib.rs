// crates/server/src/lib.rs
//! tubefetch server library.
//!
//! Axum HTTP + WebSocket front end for the download engine: starts worker
//! processes, streams their progress to every connected observer, and serves
//! each finished file once before cleaning it up.

pub mod artifacts;
pub mod config;
pub mod error;
pub mod events;
pub mod jobs;
pub mod metrics;
pub mod routes;
pub mod state;

pub use artifacts::{ArtifactError, ArtifactManager};
pub use config::ServerConfig;
pub use error::*;
pub use events::{EventBroadcaster, Observer};
pub use jobs::{JobOrchestrator, JobStore};
pub use metrics::init_metrics;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API, WebSocket and metrics routes
/// - CORS (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api_routes(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
