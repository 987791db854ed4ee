// crates/core/src/types.rs
//! Domain types shared between the core and the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque job identifier (a UUID string, assigned by the orchestrator).
pub type JobId = String;

/// Lifecycle state of a download job.
///
/// `Starting -> InProgress -> {Complete | Failed}`. `Starting` may also move
/// straight to a terminal state when the worker never reports progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Starting,
    InProgress,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// Authoritative state of one download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    #[serde(rename = "url")]
    pub source_url: String,
    #[serde(rename = "format")]
    pub requested_format: String,
    pub status: JobStatus,
    /// 0–100, never decreases.
    #[serde(rename = "progress")]
    pub progress_percent: f64,
    #[serde(rename = "file", default, skip_serializing_if = "Option::is_none")]
    pub artifact_path: Option<PathBuf>,
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(id: impl Into<JobId>, source_url: impl Into<String>, requested_format: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_url: source_url.into(),
            requested_format: requested_format.into(),
            status: JobStatus::Starting,
            progress_percent: 0.0,
            artifact_path: None,
            failure_reason: None,
            created_at: Utc::now(),
        }
    }

    /// Fold a progress event into the record.
    ///
    /// Returns `false` (and changes nothing) once the record is terminal.
    /// The stored percentage only moves forward: the worker restarts at 0%
    /// when it fetches a second stream (video, then audio).
    pub fn apply(&mut self, event: &ProgressEvent) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        match &event.kind {
            EventKind::Progress { progress } => {
                self.status = JobStatus::InProgress;
                self.progress_percent = self.progress_percent.max(*progress);
            }
            EventKind::Complete { progress, file } => {
                self.status = JobStatus::Complete;
                self.progress_percent = self.progress_percent.max(*progress);
                self.artifact_path = Some(file.clone());
            }
            EventKind::Error { error } => {
                self.status = JobStatus::Failed;
                self.failure_reason = Some(error.clone());
            }
        }
        true
    }
}

/// A progress notification for one job, as pushed to observers.
///
/// Serialized flat: `{"type":"progress","downloadId":"…","progress":12.5}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub download_id: JobId,
    #[serde(flatten)]
    pub kind: EventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EventKind {
    Progress { progress: f64 },
    Complete { progress: f64, file: PathBuf },
    Error { error: String },
}

impl ProgressEvent {
    pub fn progress(download_id: impl Into<JobId>, progress: f64) -> Self {
        Self {
            download_id: download_id.into(),
            kind: EventKind::Progress { progress },
        }
    }

    pub fn complete(download_id: impl Into<JobId>, file: impl Into<PathBuf>) -> Self {
        Self {
            download_id: download_id.into(),
            kind: EventKind::Complete {
                progress: 100.0,
                file: file.into(),
            },
        }
    }

    pub fn error(download_id: impl Into<JobId>, error: impl Into<String>) -> Self {
        Self {
            download_id: download_id.into(),
            kind: EventKind::Error { error: error.into() },
        }
    }

    /// `complete` and `error` end a job's event sequence.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, EventKind::Progress { .. })
    }
}

/// One selectable download format, simplified from the worker's metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatOption {
    pub format_id: String,
    pub quality_label: String,
    pub extension: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approx_size_bytes: Option<u64>,
    pub has_audio: bool,
    pub has_video: bool,
}

/// Result of a metadata lookup for a URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    /// Seconds.
    pub duration: Option<f64>,
    pub uploader: Option<String>,
    pub platform: String,
    pub formats: Vec<FormatOption>,
    pub original_url: String,
}
