// crates/server/src/jobs/runner.rs
//! Runs one download worker per job and turns its output into events.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr};
use tokio_util::sync::CancellationToken;
use tubefetch_core::worker::artifact_prefix;
use tubefetch_core::{
    JobId, JobRecord, OutputParser, ParsedEvent, ProgressEvent, WorkerCommand, WorkerError,
};

use super::types::{JobHandle, JobOutcome};

/// Number of trailing stderr lines kept as the failure diagnostic.
const STDERR_TAIL_LINES: usize = 50;

/// Extensions the worker uses for files it is still writing.
const PARTIAL_EXTENSIONS: [&str; 3] = ["part", "ytdl", "temp"];

/// Receives every event a run produces, in order.
///
/// For any one job, `emit` is called from a single task, and a `complete` or
/// `error` event is always the last call.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: ProgressEvent);
}

/// Spawns workers into a shared output directory.
#[derive(Clone)]
pub struct ProcessRunner {
    worker: WorkerCommand,
    output_dir: PathBuf,
    sink: Arc<dyn EventSink>,
}

impl ProcessRunner {
    pub fn new(worker: WorkerCommand, output_dir: impl Into<PathBuf>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            worker,
            output_dir: output_dir.into(),
            sink,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Start the worker for `job` in the background.
    ///
    /// Exactly one worker process is spawned. The returned handle resolves to
    /// the artifact path or the failure; either way the matching terminal
    /// event has already been emitted by then.
    pub fn run(&self, job: &JobRecord) -> JobHandle {
        let cancel = CancellationToken::new();
        let run = WorkerRun {
            job_id: job.id.clone(),
            url: job.source_url.clone(),
            format: job.requested_format.clone(),
            worker: self.worker.clone(),
            output_dir: self.output_dir.clone(),
            sink: Arc::clone(&self.sink),
        };

        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let outcome = run.execute(token).await;
            match &outcome {
                Ok(path) => {
                    tracing::info!(job_id = %run.job_id, file = %path.display(), "download complete");
                    run.sink.emit(ProgressEvent::complete(run.job_id.clone(), path.clone()));
                }
                Err(e) => {
                    tracing::warn!(job_id = %run.job_id, error = %e, "download failed");
                    run.sink.emit(ProgressEvent::error(run.job_id.clone(), e.to_string()));
                }
            }
            outcome
        });

        JobHandle::new(job.id.clone(), cancel, task)
    }
}

struct WorkerRun {
    job_id: JobId,
    url: String,
    format: String,
    worker: WorkerCommand,
    output_dir: PathBuf,
    sink: Arc<dyn EventSink>,
}

impl WorkerRun {
    async fn execute(&self, cancel: CancellationToken) -> JobOutcome {
        let template = WorkerCommand::output_template(&self.output_dir, &self.job_id);
        let mut cmd = self.worker.command();
        cmd.args(WorkerCommand::download_args(&self.url, &self.format, &template));

        let mut child = cmd.spawn().map_err(|source| WorkerError::SpawnFailed {
            program: self.worker.program.clone(),
            source,
        })?;
        tracing::info!(job_id = %self.job_id, pid = ?child.id(), format = %self.format, "worker started");

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("worker stdout was not captured"))?;
        let stderr_task = tokio::spawn(collect_stderr(child.stderr.take(), self.job_id.clone()));

        let mut parser = OutputParser::new();
        let mut buf = vec![0u8; 8 * 1024];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    stderr_task.abort();
                    return Err(self.kill(&mut child).await);
                }
                read = stdout.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        break;
                    }
                    let events = parser.feed(&buf[..n]);
                    self.forward(events);
                }
            }
        }
        let events = parser.finish();
        self.forward(events);

        let status = tokio::select! {
            _ = cancel.cancelled() => {
                stderr_task.abort();
                return Err(self.kill(&mut child).await);
            }
            status = child.wait() => status?,
        };
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let diagnostic = if stderr_tail.trim().is_empty() {
                match status.code() {
                    Some(code) => format!("download failed (exit code {code})"),
                    None => "download failed (worker terminated by signal)".to_string(),
                }
            } else {
                stderr_tail
            };
            return Err(WorkerError::Exited {
                code: status.code(),
                diagnostic,
            });
        }

        let best_guess = parser.output_path().map(Path::to_path_buf);
        match find_artifact(&self.output_dir, &self.job_id, best_guess.as_deref()).await? {
            Some(path) => Ok(path),
            None => Err(WorkerError::MissingArtifact {
                prefix: artifact_prefix(&self.job_id),
                dir: self.output_dir.clone(),
                best_guess,
            }),
        }
    }

    fn forward(&self, events: Vec<ParsedEvent>) {
        for event in events {
            match event {
                ParsedEvent::Progress(pct) => {
                    self.sink.emit(ProgressEvent::progress(self.job_id.clone(), pct));
                }
                ParsedEvent::OutputPath(path) => {
                    tracing::debug!(job_id = %self.job_id, path = %path.display(), "worker announced output file");
                }
            }
        }
    }

    async fn kill(&self, child: &mut Child) -> WorkerError {
        if let Err(e) = child.kill().await {
            tracing::warn!(job_id = %self.job_id, error = %e, "failed to kill cancelled worker");
        }
        tracing::info!(job_id = %self.job_id, "worker cancelled");
        WorkerError::Cancelled
    }
}

/// Drain the worker's stderr to EOF, keeping only the last lines.
///
/// Lines are decoded lossily; closing the pipe early would kill the worker
/// with SIGPIPE on its next write.
async fn collect_stderr(stderr: Option<ChildStderr>, job_id: JobId) -> String {
    let Some(stderr) = stderr else {
        return String::new();
    };
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    let mut segments = BufReader::new(stderr).split(b'\n');
    loop {
        let raw = match segments.next_segment().await {
            Ok(Some(raw)) => raw,
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(job_id = %job_id, error = %e, "worker stderr read failed");
                break;
            }
        };
        let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
        tracing::debug!(job_id = %job_id, line = %line, "worker stderr");
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line);
    }
    tail.into_iter().collect::<Vec<_>>().join("\n")
}

/// Locate the finished file for `job_id` in the shared output directory.
///
/// Only names starting with `<jobId>_` are considered and partial downloads
/// are skipped. The parser's best guess wins when it is among the candidates;
/// otherwise the lexically first candidate is returned.
pub async fn find_artifact(
    dir: &Path,
    job_id: &str,
    best_guess: Option<&Path>,
) -> std::io::Result<Option<PathBuf>> {
    let prefix = artifact_prefix(job_id);
    let mut candidates = Vec::new();

    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(&prefix) {
            continue;
        }
        let path = entry.path();
        let partial = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| PARTIAL_EXTENSIONS.contains(&e));
        if partial || !entry.file_type().await?.is_file() {
            continue;
        }
        candidates.push(path);
    }

    if let Some(guess) = best_guess {
        if let Some(hit) = candidates.iter().find(|c| c.as_path() == guess) {
            return Ok(Some(hit.clone()));
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}
