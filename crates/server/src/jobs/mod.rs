// crates/server/src/jobs/mod.rs
//! Download job system.
//!
//! Provides:
//! - `JobStore`: the authoritative, concurrency-safe job table
//! - `ProcessRunner`: one worker process per job, output parsed into events
//! - `JobOrchestrator`: facade that starts, looks up and cancels jobs
//! - `JobHandle`: cancellation and outcome handle for one run

pub mod orchestrator;
pub mod runner;
pub mod store;
pub mod types;

pub use orchestrator::{validate_url, JobOrchestrator, StartError, ValidationError, DEFAULT_FORMAT};
pub use runner::{EventSink, ProcessRunner};
pub use store::{JobStore, StoreError};
pub use types::{JobHandle, JobOutcome};
