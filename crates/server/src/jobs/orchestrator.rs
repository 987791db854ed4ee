// crates/server/src/jobs/orchestrator.rs
//! Entry point for download jobs: allocates ids, wires the runner's events
//! into the store and the broadcaster, and answers lookups.

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tubefetch_core::{EventKind, JobId, JobRecord, ProgressEvent, WorkerCommand};

use super::runner::{EventSink, ProcessRunner};
use super::store::{JobStore, StoreError};
use super::types::JobHandle;
use crate::events::{EventBroadcaster, Observer};
use crate::metrics::{record_job_finished, record_job_started};

/// Format used when a request does not name one.
pub const DEFAULT_FORMAT: &str = "best";

/// Rejected start request; no job was created.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("URL is required")]
    MissingUrl,

    #[error("URL must start with http:// or https://: {0}")]
    UnsupportedUrl(String),

    #[error("invalid format selector: {0:?}")]
    InvalidFormat(String),
}

#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Applies each event to the store, then publishes it.
///
/// Events for a record that is already terminal are dropped, so observers
/// never see anything after `complete`/`error`.
struct StoreAndBroadcast {
    store: Arc<JobStore>,
    broadcaster: Arc<EventBroadcaster>,
}

impl EventSink for StoreAndBroadcast {
    fn emit(&self, event: ProgressEvent) {
        let applied = self.store.update(&event.download_id, |record| record.apply(&event));
        if applied == Some(false) {
            tracing::debug!(job_id = %event.download_id, "event after terminal state dropped");
            return;
        }
        if event.is_terminal() {
            record_job_finished(matches!(event.kind, EventKind::Complete { .. }));
        }
        self.broadcaster.publish(&event);
    }
}

pub struct JobOrchestrator {
    store: Arc<JobStore>,
    broadcaster: Arc<EventBroadcaster>,
    runner: ProcessRunner,
    handles: DashMap<JobId, JobHandle>,
}

impl JobOrchestrator {
    pub fn new(
        worker: WorkerCommand,
        output_dir: impl Into<PathBuf>,
        store: Arc<JobStore>,
        broadcaster: Arc<EventBroadcaster>,
    ) -> Self {
        let sink = Arc::new(StoreAndBroadcast {
            store: Arc::clone(&store),
            broadcaster: Arc::clone(&broadcaster),
        });
        Self {
            runner: ProcessRunner::new(worker, output_dir, sink),
            store,
            broadcaster,
            handles: DashMap::new(),
        }
    }

    /// Validate the request, create a `Starting` record and launch its worker.
    ///
    /// Returns as soon as the worker is spawned; progress arrives via the
    /// broadcaster and the store.
    pub fn start_job(&self, url: &str, format: Option<&str>) -> Result<JobRecord, StartError> {
        let (url, format) = validate_request(url, format)?;

        // Drop handles of runs that already reached a terminal state.
        self.handles.retain(|_, handle| !handle.is_finished());

        let id = uuid::Uuid::new_v4().to_string();
        let record = self.store.create(id.clone(), url, format)?;
        let handle = self.runner.run(&record);
        self.handles.insert(id, handle);

        record_job_started();
        tracing::info!(job_id = %record.id, url = %record.source_url, format = %record.requested_format, "download started");
        Ok(record)
    }

    pub fn get_job(&self, id: &str) -> Option<JobRecord> {
        self.store.get(id)
    }

    pub fn list_jobs(&self) -> Vec<JobRecord> {
        self.store.list()
    }

    /// Stop an in-flight job. Its record becomes `Failed` with reason
    /// `"cancelled"`. Returns false if there is nothing running under `id`.
    pub fn cancel_job(&self, id: &str) -> bool {
        match self.handles.remove(id) {
            Some((_, handle)) => handle.cancel(),
            None => false,
        }
    }

    /// Take the run handle for `id`, e.g. to await its outcome.
    pub fn take_handle(&self, id: &str) -> Option<JobHandle> {
        self.handles.remove(id).map(|(_, handle)| handle)
    }

    pub fn subscribe(&self) -> Observer {
        self.broadcaster.subscribe()
    }

    pub fn unsubscribe(&self, observer_id: &str) -> bool {
        self.broadcaster.unsubscribe(observer_id)
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    pub fn broadcaster(&self) -> &Arc<EventBroadcaster> {
        &self.broadcaster
    }
}

/// Trim `url` and require an http(s) scheme. Anything else (including
/// option-like strings) never reaches the worker's argument list.
pub fn validate_url(url: &str) -> Result<&str, ValidationError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ValidationError::MissingUrl);
    }
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return Err(ValidationError::UnsupportedUrl(url.to_string()));
    }
    Ok(url)
}

fn validate_request<'a>(url: &'a str, format: Option<&'a str>) -> Result<(&'a str, &'a str), ValidationError> {
    let url = validate_url(url)?;

    let format = format.map(str::trim).filter(|f| !f.is_empty()).unwrap_or(DEFAULT_FORMAT);
    if format.starts_with('-') || format.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(ValidationError::InvalidFormat(format.to_string()));
    }
    Ok((url, format))
}
