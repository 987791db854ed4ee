// crates/server/src/artifacts.rs
//! Serving finished downloads and cleaning them up afterwards.
//!
//! A completed job's file is streamed to the client once. When the transfer
//! ends (finished or aborted) a cleanup is scheduled: after the grace period
//! the file is deleted and the job record evicted. A file that has already
//! disappeared counts as deleted.
//!
//! Jobs whose file is never fetched, and failed jobs, are handled by the
//! retention sweep: finished records older than the retention window are
//! evicted and any artifact they still own is deleted.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use futures_util::Stream;
use thiserror::Error;
use tokio::fs::File;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tubefetch_core::{JobId, JobStatus};

use crate::jobs::JobStore;
use crate::metrics::{record_artifact_cleaned, record_artifact_served};

/// Default delay between the end of a transfer and deletion.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Default age after which finished jobs are swept.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60 * 60);

/// How often the retention sweep runs.
pub const RETENTION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ArtifactError {
    /// The job is unknown, not complete, or its file is gone.
    #[error("artifact not found for job {0}")]
    NotFound(JobId),

    #[error("failed to open artifact {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub struct ArtifactManager {
    store: Arc<JobStore>,
    grace_period: Duration,
}

impl ArtifactManager {
    pub fn new(store: Arc<JobStore>, grace_period: Duration) -> Self {
        Self {
            store,
            grace_period,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Open the artifact of a completed job for streaming.
    ///
    /// Cleanup is scheduled when the returned stream is dropped.
    pub async fn serve(&self, job_id: &str) -> Result<ServedArtifact, ArtifactError> {
        let not_found = || ArtifactError::NotFound(job_id.to_string());

        let record = self.store.get(job_id).ok_or_else(not_found)?;
        if record.status != JobStatus::Complete {
            return Err(not_found());
        }
        let path = record.artifact_path.ok_or_else(not_found)?;

        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(source) => return Err(ArtifactError::Io { path, source }),
        };
        let len = file
            .metadata()
            .await
            .map_err(|source| ArtifactError::Io {
                path: path.clone(),
                source,
            })?
            .len();

        record_artifact_served();
        tracing::info!(job_id = %job_id, file = %path.display(), bytes = len, "serving artifact");

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{job_id}.bin"));
        let cleanup = ScheduledCleanup {
            job_id: job_id.to_string(),
            path,
            store: Arc::clone(&self.store),
            grace_period: self.grace_period,
        };

        Ok(ServedArtifact {
            file_name,
            len,
            stream: ArtifactStream {
                inner: ReaderStream::new(file),
                cleanup: Some(cleanup),
            },
        })
    }

    /// Evict finished jobs created more than `max_age` ago and delete the
    /// artifacts they left behind. Returns how many records were evicted.
    pub async fn sweep_expired(&self, max_age: Duration) -> usize {
        let Some(cutoff) = chrono::Duration::from_std(max_age)
            .ok()
            .and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return 0;
        };

        let expired = self.store.remove_finished_before(cutoff);
        for record in &expired {
            let Some(path) = &record.artifact_path else {
                continue;
            };
            match tokio::fs::remove_file(path).await {
                Ok(()) => record_artifact_cleaned(),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(job_id = %record.id, file = %path.display(), error = %e, "failed to delete expired artifact");
                }
            }
        }
        if !expired.is_empty() {
            tracing::info!(evicted = expired.len(), "retention sweep evicted finished jobs");
        }
        expired.len()
    }

    /// Run [`ArtifactManager::sweep_expired`] every `interval` until the
    /// runtime shuts down.
    pub fn spawn_retention_sweep(self: Arc<Self>, max_age: Duration, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.sweep_expired(max_age).await;
            }
        })
    }
}

pub struct ServedArtifact {
    pub file_name: String,
    pub len: u64,
    pub stream: ArtifactStream,
}

/// File body that schedules the artifact's cleanup when dropped.
pub struct ArtifactStream {
    inner: ReaderStream<File>,
    cleanup: Option<ScheduledCleanup>,
}

impl Stream for ArtifactStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for ArtifactStream {
    fn drop(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            cleanup.schedule();
        }
    }
}

/// Deferred deletion of one artifact plus eviction of its job record.
#[derive(Debug, Clone)]
pub struct ScheduledCleanup {
    pub job_id: JobId,
    pub path: PathBuf,
    store: Arc<JobStore>,
    grace_period: Duration,
}

/// What a cleanup found when it ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    Deleted,
    AlreadyGone,
    Failed,
}

impl ScheduledCleanup {
    /// Run after the grace period on the current runtime. Without a runtime
    /// (e.g. dropped during shutdown) it runs immediately and synchronously.
    pub fn schedule(self) -> Option<JoinHandle<CleanupOutcome>> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => Some(handle.spawn(async move {
                tokio::time::sleep(self.grace_period).await;
                self.run().await
            })),
            Err(_) => {
                let outcome = remove_file_sync(&self.path);
                self.store.remove(&self.job_id);
                tracing::debug!(job_id = %self.job_id, ?outcome, "artifact cleaned up without runtime");
                None
            }
        }
    }

    /// Delete the file and evict the record now. Idempotent.
    pub async fn run(&self) -> CleanupOutcome {
        let outcome = match tokio::fs::remove_file(&self.path).await {
            Ok(()) => CleanupOutcome::Deleted,
            Err(e) if e.kind() == io::ErrorKind::NotFound => CleanupOutcome::AlreadyGone,
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, file = %self.path.display(), error = %e, "failed to delete artifact");
                CleanupOutcome::Failed
            }
        };
        self.store.remove(&self.job_id);
        if outcome == CleanupOutcome::Deleted {
            record_artifact_cleaned();
        }
        tracing::info!(job_id = %self.job_id, ?outcome, "artifact cleaned up");
        outcome
    }
}

fn remove_file_sync(path: &Path) -> CleanupOutcome {
    match std::fs::remove_file(path) {
        Ok(()) => CleanupOutcome::Deleted,
        Err(e) if e.kind() == io::ErrorKind::NotFound => CleanupOutcome::AlreadyGone,
        Err(_) => CleanupOutcome::Failed,
    }
}
