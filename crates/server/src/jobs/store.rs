// crates/server/src/jobs/store.rs
//! The job table: sole owner of every `JobRecord`.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;
use tubefetch_core::{JobId, JobRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("job already exists: {0}")]
    AlreadyExists(JobId),
}

/// Concurrency-safe map from job id to record.
///
/// Callers only ever get clones out; mutation goes through [`JobStore::update`],
/// which holds the entry lock for the whole read-modify-write. Updates to
/// different ids proceed in parallel.
#[derive(Debug, Default)]
pub struct JobStore {
    jobs: DashMap<JobId, JobRecord>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh `Starting` record. Fails if the id is taken.
    pub fn create(
        &self,
        id: impl Into<JobId>,
        source_url: impl Into<String>,
        requested_format: impl Into<String>,
    ) -> Result<JobRecord, StoreError> {
        match self.jobs.entry(id.into()) {
            Entry::Occupied(entry) => Err(StoreError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                let record = JobRecord::new(entry.key().clone(), source_url, requested_format);
                entry.insert(record.clone());
                Ok(record)
            }
        }
    }

    /// Atomically mutate one record.
    ///
    /// Returns `None` when the id is unknown. A job can be evicted while an
    /// update for it is still in flight, so this is logged and ignored.
    pub fn update<R>(&self, id: &str, mutate: impl FnOnce(&mut JobRecord) -> R) -> Option<R> {
        match self.jobs.get_mut(id) {
            Some(mut entry) => Some(mutate(entry.value_mut())),
            None => {
                tracing::debug!(job_id = %id, "update for unknown job ignored");
                None
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.jobs.get(id).map(|entry| entry.value().clone())
    }

    /// Snapshot of all records, oldest first.
    pub fn list(&self) -> Vec<JobRecord> {
        let mut records: Vec<JobRecord> = self.jobs.iter().map(|e| e.value().clone()).collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        records
    }

    pub fn remove(&self, id: &str) -> Option<JobRecord> {
        self.jobs.remove(id).map(|(_, record)| record)
    }

    /// Evict finished records created before `cutoff` and return them.
    /// Jobs still in flight are kept regardless of age.
    pub fn remove_finished_before(&self, cutoff: DateTime<Utc>) -> Vec<JobRecord> {
        let candidates: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|e| e.status.is_terminal() && e.created_at < cutoff)
            .map(|e| e.key().clone())
            .collect();
        candidates
            .into_iter()
            .filter_map(|id| {
                self.jobs
                    .remove_if(&id, |_, r| r.status.is_terminal() && r.created_at < cutoff)
                    .map(|(_, record)| record)
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}
