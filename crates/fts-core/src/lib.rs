//! fts-core - Core library for the FTS questionnaire client
//!
//! This crate contains the offline-first draft store, the outbox of pending
//! mutations, and the sync engine that replays queued work against the FTS
//! backend when connectivity and a valid session are available.

pub mod api;
pub mod capture;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;
pub mod util;

pub use capture::{DraftCapture, SaveOutcome};
pub use error::{Error, Result};
pub use models::{Draft, DraftId, DraftMeta, DraftStatus, Job, JobId, JobKind, MetaPatch};
pub use sync::gate::{ConnectivityState, GateStatus, SessionGate};
pub use sync::{SyncEngine, SyncReport};
