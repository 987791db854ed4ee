// crates/server/src/jobs/types.rs
//! Types for the download job system.

use std::path::PathBuf;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tubefetch_core::{JobId, WorkerError};

/// Terminal outcome of one worker run.
pub type JobOutcome = Result<PathBuf, WorkerError>;

/// Handle to a running worker, used for cancellation and for awaiting the
/// outcome. Dropping the handle does not stop the worker.
pub struct JobHandle {
    pub id: JobId,
    cancel: CancellationToken,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    pub(crate) fn new(id: JobId, cancel: CancellationToken, task: JoinHandle<JobOutcome>) -> Self {
        Self { id, cancel, task }
    }

    /// Ask the worker to stop. Returns true if the job was still running.
    pub fn cancel(&self) -> bool {
        if self.task.is_finished() || self.cancel.is_cancelled() {
            return false;
        }
        self.cancel.cancel();
        true
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the terminal outcome.
    pub async fn wait(self) -> JobOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(WorkerError::Io(std::io::Error::other(format!(
                "worker task for job {} aborted: {e}",
                self.id
            )))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_job_handle_cancel() {
        let token = CancellationToken::new();
        let child = token.clone();
        let task = tokio::spawn(async move {
            child.cancelled().await;
            Err(WorkerError::Cancelled)
        });
        let handle = JobHandle::new("j".to_string(), token, task);

        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(matches!(handle.wait().await, Err(WorkerError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_after_finish_is_false() {
        let task = tokio::spawn(async { Ok(PathBuf::from("/d/j_x.mp4")) });
        let handle = JobHandle::new("j".to_string(), CancellationToken::new(), task);
        while !handle.is_finished() {
            tokio::task::yield_now().await;
        }
        assert!(!handle.cancel());
        assert_eq!(handle.wait().await.unwrap(), PathBuf::from("/d/j_x.mp4"));
    }
}
