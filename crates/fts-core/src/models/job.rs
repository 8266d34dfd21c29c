//! Outbox job model: a queued intent to sync one draft

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::DraftId;
use crate::util::unix_timestamp_millis;

/// A unique identifier for an outbox job, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    /// Create a new unique job ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The mutation a job intends to replay.
///
/// `Unknown` carries the raw label of a row written by a different app
/// version; the sync engine discards such jobs instead of letting them
/// block the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobKind {
    /// Non-terminal upsert of the draft's payload
    Save,
    /// Terminal lock-and-submit
    Finalize,
    /// Unrecognized persisted label (forward/backward version skew)
    Unknown(String),
}

impl JobKind {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Save => "save",
            Self::Finalize => "finalize",
            Self::Unknown(raw) => raw,
        }
    }

    /// Parse a persisted label. Never fails; unrecognized labels are kept
    /// verbatim so the row can still be addressed and removed.
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label {
            "save" => Self::Save,
            "finalize" => Self::Finalize,
            other => Self::Unknown(other.to_string()),
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued mutation intent referencing one draft.
///
/// Jobs are immutable once enqueued; a failed job stays untouched for the
/// next sync attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: JobId,
    pub kind: JobKind,
    pub draft_id: DraftId,
    /// Server id known at enqueue time, if any
    pub server_qid: Option<String>,
    /// Enqueue timestamp (Unix ms), establishes FIFO replay order
    pub created_at: i64,
}

impl Job {
    /// Create a `save` job for the given draft
    #[must_use]
    pub fn save(draft_id: DraftId) -> Self {
        Self::new(JobKind::Save, draft_id)
    }

    /// Create a `finalize` job for the given draft
    #[must_use]
    pub fn finalize(draft_id: DraftId) -> Self {
        Self::new(JobKind::Finalize, draft_id)
    }

    fn new(kind: JobKind, draft_id: DraftId) -> Self {
        Self {
            id: JobId::new(),
            kind,
            draft_id,
            server_qid: None,
            created_at: unix_timestamp_millis(),
        }
    }

    /// Attach a server id known at enqueue time
    #[must_use]
    pub fn with_server_hint(mut self, server_qid: impl Into<String>) -> Self {
        self.server_qid = Some(server_qid.into());
        self
    }
}
