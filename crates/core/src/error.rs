// crates/core/src/error.rs
use std::path::PathBuf;
use thiserror::Error;

/// Errors from running a download worker for one job.
///
/// The `Display` text is what observers see in the job's `error` event.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("failed to launch `{program}`: {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{diagnostic}")]
    Exited { code: Option<i32>, diagnostic: String },

    #[error("worker exited successfully but no file with prefix `{prefix}` exists in {}", .dir.display())]
    MissingArtifact {
        prefix: String,
        dir: PathBuf,
        best_guess: Option<PathBuf>,
    },

    #[error("cancelled")]
    Cancelled,

    #[error("I/O error while supervising worker: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the metadata lookup.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("worker not found: {0}")]
    SpawnFailed(String),

    #[error("{0}")]
    LookupFailed(String),

    #[error("metadata lookup timed out after {0}s")]
    Timeout(u64),

    #[error("failed to parse video info: {0}")]
    InvalidJson(#[from] serde_json::Error),
}
