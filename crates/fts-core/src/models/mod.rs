//! Domain models shared across the crate

pub mod draft;
pub mod job;

pub use draft::{case_number_of, Draft, DraftId, DraftMeta, DraftStatus, MetaPatch};
pub use job::{Job, JobId, JobKind};
