// crates/core/src/lib.rs
//! Core library for tubefetch.
//!
//! Holds everything that does not need the HTTP server:
//! - domain types (`JobRecord`, `ProgressEvent`, `VideoInfo`, ...)
//! - the incremental worker-output parser
//! - the worker-process contract (arguments, availability, metadata lookup)

pub mod error;
pub mod formats;
pub mod platform;
pub mod progress;
pub mod types;
pub mod worker;

pub use error::*;
pub use formats::simplify_formats;
pub use platform::detect_platform;
pub use progress::{OutputParser, ParsedEvent};
pub use types::*;
pub use worker::WorkerCommand;
