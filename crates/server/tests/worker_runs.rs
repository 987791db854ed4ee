//! End-to-end job runs against fake shell workers.
#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{events_until_terminal, harness, progress_values, SUCCESS_BODY};
use pretty_assertions::assert_eq;
use tubefetch_core::{EventKind, JobStatus, WorkerError};

#[tokio::test]
async fn successful_run_reports_progress_then_complete() {
    let h = harness(SUCCESS_BODY);
    let mut observer = h.orchestrator.subscribe();

    let job = h.orchestrator.start_job("https://youtu.be/abc", Some("best")).unwrap();
    let events = events_until_terminal(&mut observer.rx, &job.id).await;

    assert_eq!(progress_values(&events), vec![25.0, 50.0, 100.0]);
    let expected = h.downloads.join(format!("{}_Test Video.mp4", job.id));
    match &events.last().unwrap().kind {
        EventKind::Complete { progress, file } => {
            assert_eq!(*progress, 100.0);
            assert_eq!(file, &expected);
        }
        other => panic!("expected complete, got {other:?}"),
    }

    let record = h.orchestrator.get_job(&job.id).unwrap();
    assert_eq!(record.status, JobStatus::Complete);
    assert_eq!(record.progress_percent, 100.0);
    assert_eq!(record.artifact_path, Some(expected.clone()));
    assert_eq!(std::fs::read(&expected).unwrap(), b"video bytes");
}

#[tokio::test]
async fn nonzero_exit_reports_stderr() {
    let h = harness(
        r#"
echo "[download]  10.0% of 1.00MiB"
echo "ERROR: [generic] Unsupported URL: $8" >&2
exit 1
"#,
    );
    let mut observer = h.orchestrator.subscribe();

    let job = h.orchestrator.start_job("https://example.com/nope", None).unwrap();
    let events = events_until_terminal(&mut observer.rx, &job.id).await;

    assert_eq!(progress_values(&events), vec![10.0]);
    match &events.last().unwrap().kind {
        EventKind::Error { error } => {
            assert!(error.contains("Unsupported URL: https://example.com/nope"), "{error}");
        }
        other => panic!("expected error, got {other:?}"),
    }

    let record = h.orchestrator.get_job(&job.id).unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.progress_percent, 10.0);
    assert!(record.artifact_path.is_none());
}

#[tokio::test]
async fn invalid_utf8_on_stderr_keeps_the_diagnostic() {
    let h = harness(
        r#"
printf 'bad \377 byte\n' >&2
echo 'ERROR: the real reason' >&2
exit 1
"#,
    );
    let job = h.orchestrator.start_job("https://youtu.be/abc", None).unwrap();

    let outcome = h.orchestrator.take_handle(&job.id).unwrap().wait().await;
    assert!(matches!(outcome, Err(WorkerError::Exited { code: Some(1), .. })));

    let reason = h.orchestrator.get_job(&job.id).unwrap().failure_reason.unwrap();
    assert!(reason.contains("ERROR: the real reason"), "{reason}");
    assert!(reason.contains("bad \u{FFFD} byte"), "{reason}");
}

#[tokio::test]
async fn invalid_utf8_on_stderr_does_not_kill_a_good_download() {
    let body = format!(
        "printf 'title \\377\\376\\n' >&2\nfor i in 1 2 3 4 5; do echo \"warning $i\" >&2; done\n{SUCCESS_BODY}"
    );
    let h = harness(&body);
    let job = h.orchestrator.start_job("https://youtu.be/abc", None).unwrap();

    let path = h.orchestrator.take_handle(&job.id).unwrap().wait().await.unwrap();
    assert_eq!(path, h.downloads.join(format!("{}_Test Video.mp4", job.id)));
    assert_eq!(h.orchestrator.get_job(&job.id).unwrap().status, JobStatus::Complete);
}

#[tokio::test]
async fn silent_failure_reports_exit_code() {
    let h = harness("exit 3\n");
    let job = h.orchestrator.start_job("https://youtu.be/abc", None).unwrap();

    let outcome = h.orchestrator.take_handle(&job.id).unwrap().wait().await;
    assert!(matches!(outcome, Err(WorkerError::Exited { code: Some(3), .. })));

    let record = h.orchestrator.get_job(&job.id).unwrap();
    assert_eq!(record.failure_reason.as_deref(), Some("download failed (exit code 3)"));
}

#[tokio::test]
async fn zero_exit_without_file_is_failure() {
    let h = harness(
        r#"
echo "[download] Destination: $out"
echo "[download] 100.0% of 1.00MiB"
"#,
    );
    let job = h.orchestrator.start_job("https://youtu.be/abc", None).unwrap();

    let outcome = h.orchestrator.take_handle(&job.id).unwrap().wait().await;
    assert!(matches!(outcome, Err(WorkerError::MissingArtifact { .. })));

    let record = h.orchestrator.get_job(&job.id).unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.failure_reason.unwrap().contains(&format!("{}_", job.id)));
}

#[tokio::test]
async fn merged_output_is_preferred_over_intermediate_files() {
    let h = harness(
        r#"
video=$(printf '%s' "$4" | sed -e 's/%(title)s/Clip/' -e 's/%(ext)s/f137.mp4/')
merged=$(printf '%s' "$4" | sed -e 's/%(title)s/Clip/' -e 's/%(ext)s/mp4/')
echo "[download] Destination: $video"
echo "[download] 100.0% of 5.00MiB"
printf 'v' > "$video"
echo "[Merger] Merging formats into \"$merged\""
printf 'merged' > "$merged"
"#,
    );
    let job = h.orchestrator.start_job("https://youtu.be/abc", None).unwrap();
    let path = h.orchestrator.take_handle(&job.id).unwrap().wait().await.unwrap();
    assert_eq!(path, h.downloads.join(format!("{}_Clip.mp4", job.id)));
}

#[tokio::test]
async fn cancel_kills_worker_and_fails_job() {
    let h = harness(
        r#"
echo "[download]   5.0% of 100.00MiB"
exec sleep 30
"#,
    );
    let mut observer = h.orchestrator.subscribe();
    let job = h.orchestrator.start_job("https://youtu.be/abc", None).unwrap();

    let first = tokio::time::timeout(Duration::from_secs(10), observer.rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(first.kind, EventKind::Progress { progress } if progress == 5.0));

    assert!(h.orchestrator.cancel_job(&job.id));
    let events = events_until_terminal(&mut observer.rx, &job.id).await;
    match &events.last().unwrap().kind {
        EventKind::Error { error } => assert_eq!(error, "cancelled"),
        other => panic!("expected error, got {other:?}"),
    }

    let record = h.orchestrator.get_job(&job.id).unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.failure_reason.as_deref(), Some("cancelled"));
    assert!(!h.orchestrator.cancel_job(&job.id));
}

#[tokio::test]
async fn concurrent_jobs_stay_separate() {
    let h = harness(SUCCESS_BODY);
    let mut observer = h.orchestrator.subscribe();

    let a = h.orchestrator.start_job("https://youtu.be/a", None).unwrap();
    let b = h.orchestrator.start_job("https://youtu.be/b", None).unwrap();
    assert_ne!(a.id, b.id);

    let mut all = Vec::new();
    let mut terminals = 0;
    while terminals < 2 {
        let event = tokio::time::timeout(Duration::from_secs(10), observer.rx.recv())
            .await
            .unwrap()
            .unwrap();
        if event.is_terminal() {
            terminals += 1;
        }
        all.push(event);
    }

    for job in [&a, &b] {
        let own: Vec<_> = all.iter().filter(|e| e.download_id == job.id).cloned().collect();
        assert_eq!(progress_values(&own), vec![25.0, 50.0, 100.0]);
        let record = h.orchestrator.get_job(&job.id).unwrap();
        assert_eq!(record.status, JobStatus::Complete);
        let file = record.artifact_path.unwrap();
        assert!(file
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(&format!("{}_", job.id)));
    }
    assert_eq!(h.orchestrator.list_jobs().len(), 2);
}
