// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use crate::artifacts::ArtifactManager;
use crate::config::ServerConfig;
use crate::events::EventBroadcaster;
use crate::jobs::{JobOrchestrator, JobStore};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    pub config: ServerConfig,
    /// Starts, tracks and cancels download jobs.
    pub orchestrator: Arc<JobOrchestrator>,
    /// Streams finished files and schedules their cleanup.
    pub artifacts: Arc<ArtifactManager>,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    ///
    /// The store is shared between the orchestrator and the artifact manager
    /// so that cleanup evicts the same records the orchestrator created.
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let store = Arc::new(JobStore::new());
        let broadcaster = Arc::new(EventBroadcaster::new());
        let orchestrator = JobOrchestrator::new(
            config.worker.clone(),
            config.downloads_dir.clone(),
            Arc::clone(&store),
            broadcaster,
        );
        let artifacts = ArtifactManager::new(store, config.cleanup_grace);

        Arc::new(Self {
            start_time: Instant::now(),
            config,
            orchestrator: Arc::new(orchestrator),
            artifacts: Arc::new(artifacts),
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
