// crates/core/src/worker.rs
//! The download-worker process contract.
//!
//! The worker is an external downloader (yt-dlp compatible). For a download
//! it is invoked as
//!
//! ```text
//! <program> [leading args] -f <format> -o <dir>/<jobId>_%(title)s.%(ext)s --newline --no-warnings -- <url>
//! ```
//!
//! The `--` keeps a URL that starts with `-` from being read as an option.
//!
//! It must print progress lines on stdout and exit zero only when a file with
//! the `<jobId>_` prefix exists in `<dir>`.

use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::error::MetadataError;
use crate::formats::{simplify_formats, RawFormat};
use crate::platform::detect_platform;
use crate::types::VideoInfo;

/// Default worker executable.
pub const DEFAULT_WORKER_PROGRAM: &str = "yt-dlp";

const METADATA_TIMEOUT: Duration = Duration::from_secs(60);

/// How to launch the worker.
///
/// `leading_args` go before every invocation's own arguments; this lets the
/// worker be a script run through an interpreter (`sh fake-worker.sh ...`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: String,
    pub leading_args: Vec<String>,
}

impl Default for WorkerCommand {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_PROGRAM)
    }
}

impl WorkerCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            leading_args: Vec::new(),
        }
    }

    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// A `Command` for the worker with stdin closed and stdout/stderr piped.
    ///
    /// The child is killed if its handle is dropped.
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Output template for a job. The `<jobId>_` prefix is what keeps
    /// concurrent jobs in one directory apart.
    pub fn output_template(dir: &Path, job_id: &str) -> PathBuf {
        dir.join(format!("{}%(title)s.%(ext)s", artifact_prefix(job_id)))
    }

    /// Arguments for a download, in the order documented at module level.
    pub fn download_args(url: &str, format: &str, template: &Path) -> Vec<OsString> {
        vec![
            "-f".into(),
            format.into(),
            "-o".into(),
            template.as_os_str().to_owned(),
            "--newline".into(),
            "--no-warnings".into(),
            "--".into(),
            url.into(),
        ]
    }

    /// Arguments for a metadata lookup.
    pub fn metadata_args(url: &str) -> Vec<OsString> {
        ["--dump-json", "--no-download", "--no-warnings", "--", url]
            .into_iter()
            .map(OsString::from)
            .collect()
    }

    /// Whether the worker can be launched and reports a version.
    pub async fn is_available(&self) -> bool {
        let mut cmd = self.command();
        cmd.arg("--version");
        match cmd.output().await {
            Ok(output) => output.status.success(),
            Err(e) => {
                tracing::debug!(program = %self.program, error = %e, "worker availability probe failed");
                false
            }
        }
    }

    /// Resolve a URL to title, thumbnail, duration and a format menu.
    pub async fn fetch_video_info(&self, url: &str) -> Result<VideoInfo, MetadataError> {
        let mut cmd = self.command();
        cmd.args(Self::metadata_args(url));

        let output = tokio::time::timeout(METADATA_TIMEOUT, cmd.output())
            .await
            .map_err(|_| MetadataError::Timeout(METADATA_TIMEOUT.as_secs()))?
            .map_err(|e| {
                tracing::error!(program = %self.program, error = %e, "failed to spawn worker for metadata");
                MetadataError::SpawnFailed(e.to_string())
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(url, exit_code = ?output.status.code(), "metadata lookup failed");
            return Err(MetadataError::LookupFailed(if stderr.is_empty() {
                "Failed to get video info".to_string()
            } else {
                stderr
            }));
        }

        parse_video_info(&String::from_utf8_lossy(&output.stdout), url)
    }
}

/// File-name prefix every artifact of `job_id` starts with.
pub fn artifact_prefix(job_id: &str) -> String {
    format!("{job_id}_")
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    id: Option<String>,
    title: Option<String>,
    thumbnail: Option<String>,
    duration: Option<f64>,
    uploader: Option<String>,
    channel: Option<String>,
    extractor_key: Option<String>,
    #[serde(default)]
    formats: Vec<RawFormat>,
}

/// Turn the worker's `--dump-json` output into a [`VideoInfo`].
pub fn parse_video_info(json: &str, url: &str) -> Result<VideoInfo, MetadataError> {
    let raw: RawInfo = serde_json::from_str(json.trim())?;
    Ok(VideoInfo {
        id: raw.id,
        title: raw.title,
        thumbnail: raw.thumbnail,
        duration: raw.duration,
        uploader: raw.uploader.or(raw.channel),
        platform: raw
            .extractor_key
            .unwrap_or_else(|| detect_platform(url).to_string()),
        formats: simplify_formats(&raw.formats),
        original_url: url.to_string(),
    })
}
