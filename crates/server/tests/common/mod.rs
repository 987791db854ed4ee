//! Shared helpers: fake download workers written as shell scripts.
//!
//! The worker is invoked as `sh <script> -f <fmt> -o <template> --newline
//! --no-warnings -- <url>`, so inside the script `$4` is the output template
//! and `$8` the URL.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tubefetch_core::{EventKind, ProgressEvent, WorkerCommand};
use tubefetch_server::{EventBroadcaster, JobOrchestrator, JobStore};

/// Resolves `$4` into a concrete file name, like the real worker does.
const RESOLVE_OUTPUT: &str =
    r#"out=$(printf '%s' "$4" | sed -e 's/%(title)s/Test Video/' -e 's/%(ext)s/mp4/')"#;

/// Reports progress (with a duplicate line) and writes the file.
pub const SUCCESS_BODY: &str = r#"
echo "[youtube] abc: Downloading webpage"
echo "[download] Destination: $out"
echo "[download]   0.0% of 10.00MiB at 1.00MiB/s ETA 00:10"
echo "[download]  25.0% of 10.00MiB at 1.00MiB/s ETA 00:07"
echo "[download]  25.0% of 10.00MiB at 1.00MiB/s ETA 00:07"
echo "[download]  50.0% of 10.00MiB at 1.00MiB/s ETA 00:05"
printf 'partial' > "$out.part"
echo "[download] 100.0% of 10.00MiB in 00:10"
printf 'video bytes' > "$out"
"#;

pub fn write_worker(dir: &Path, name: &str, body: &str) -> WorkerCommand {
    let script = dir.join(name);
    std::fs::write(&script, format!("{RESOLVE_OUTPUT}\n{body}")).unwrap();
    WorkerCommand::new("sh").with_leading_args([script.to_string_lossy().into_owned()])
}

pub struct Harness {
    pub orchestrator: JobOrchestrator,
    pub downloads: PathBuf,
    _scripts: tempfile::TempDir,
    _downloads: tempfile::TempDir,
}

pub fn harness(body: &str) -> Harness {
    let scripts = tempfile::tempdir().unwrap();
    let downloads = tempfile::tempdir().unwrap();
    let worker = write_worker(scripts.path(), "worker.sh", body);
    let orchestrator = JobOrchestrator::new(
        worker,
        downloads.path(),
        Arc::new(JobStore::new()),
        Arc::new(EventBroadcaster::new()),
    );
    Harness {
        orchestrator,
        downloads: downloads.path().to_path_buf(),
        _scripts: scripts,
        _downloads: downloads,
    }
}

/// Receive events until the terminal one for `job_id`.
pub async fn events_until_terminal(
    rx: &mut mpsc::UnboundedReceiver<ProgressEvent>,
    job_id: &str,
) -> Vec<ProgressEvent> {
    let mut out = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("timed out waiting for events")
            .expect("broadcaster closed");
        if event.download_id != job_id {
            continue;
        }
        let done = event.is_terminal();
        out.push(event);
        if done {
            return out;
        }
    }
}

pub fn progress_values(events: &[ProgressEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|e| match e.kind {
            EventKind::Progress { progress } => Some(progress),
            _ => None,
        })
        .collect()
}
