//! Draft model: a questionnaire's working copy plus sync metadata

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix marking device-generated ids that are never sent to the server.
const LOCAL_PREFIX: &str = "local:";

/// Identifier for a draft.
///
/// A draft is keyed either by a device-generated placeholder (UUID v7,
/// rendered `local:<uuid>`) or by the authoritative id the server assigned
/// at creation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DraftId {
    /// Device-generated placeholder, unknown to the server
    Local(Uuid),
    /// Server-assigned authoritative id
    Server(String),
}

impl DraftId {
    /// Mint a new local placeholder id using UUID v7 (time-sortable)
    #[must_use]
    pub fn new_local() -> Self {
        Self::Local(Uuid::now_v7())
    }

    /// True when this id is a local placeholder
    #[must_use]
    pub const fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// The server id embedded in this id, when it is not a placeholder
    #[must_use]
    pub fn as_server_id(&self) -> Option<&str> {
        match self {
            Self::Local(_) => None,
            Self::Server(id) => Some(id),
        }
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(uuid) => write!(f, "{LOCAL_PREFIX}{uuid}"),
            Self::Server(id) => write!(f, "{id}"),
        }
    }
}

impl FromStr for DraftId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(rest) = s.strip_prefix(LOCAL_PREFIX) {
            let uuid = Uuid::parse_str(rest).map_err(|_| {
                crate::Error::InvalidInput(format!("invalid local draft id: {s}"))
            })?;
            return Ok(Self::Local(uuid));
        }
        if s.is_empty() {
            return Err(crate::Error::InvalidInput(
                "draft id must not be empty".to_string(),
            ));
        }
        Ok(Self::Server(s.to_string()))
    }
}

impl From<DraftId> for String {
    fn from(id: DraftId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for DraftId {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Informational draft lifecycle label; never gates sync behavior
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftStatus {
    #[default]
    #[serde(rename = "draft")]
    Draft,
    #[serde(rename = "draft (local)")]
    LocalDraft,
    #[serde(rename = "queued")]
    Queued,
    #[serde(rename = "submitted")]
    Submitted,
}

impl DraftStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::LocalDraft => "draft (local)",
            Self::Queued => "queued",
            Self::Submitted => "submitted",
        }
    }
}

impl fmt::Display for DraftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metadata stored alongside a draft's payload.
///
/// `server_id` binds a locally-created draft to its server counterpart once
/// the server has accepted a creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
    #[serde(default)]
    pub status: DraftStatus,
}

impl DraftMeta {
    /// Merge a patch into this metadata. Absent patch fields keep the
    /// existing values, so a repeated save never clears `server_id`.
    pub fn apply(&mut self, patch: MetaPatch) {
        if let Some(server_id) = patch.server_id {
            self.server_id = Some(server_id);
        }
        if let Some(case_number) = patch.case_number {
            self.case_number = Some(case_number);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
    }
}

/// Partial metadata update merged into stored metadata on `put`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaPatch {
    pub server_id: Option<String>,
    pub case_number: Option<String>,
    pub status: Option<DraftStatus>,
}

impl MetaPatch {
    #[must_use]
    pub fn with_server_id(mut self, server_id: impl Into<String>) -> Self {
        self.server_id = Some(server_id.into());
        self
    }

    #[must_use]
    pub fn with_case_number(mut self, case_number: impl Into<String>) -> Self {
        self.case_number = Some(case_number.into());
        self
    }

    #[must_use]
    pub const fn with_status(mut self, status: DraftStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// A questionnaire's working data plus metadata.
///
/// The payload is opaque to this crate; only `case_number` is ever read,
/// and only for display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub id: DraftId,
    pub data: Value,
    pub meta: DraftMeta,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last update timestamp (Unix ms)
    pub updated_at: i64,
}

impl Draft {
    /// Candidate server identity for this draft, in priority order:
    /// the linked `server_id` metadata, else the id itself when it is
    /// already a server id.
    #[must_use]
    pub fn server_identity(&self) -> Option<String> {
        self.meta
            .server_id
            .clone()
            .or_else(|| self.id.as_server_id().map(str::to_string))
    }

    /// Case number for display: linked metadata first, then the payload
    #[must_use]
    pub fn case_number(&self) -> Option<String> {
        self.meta
            .case_number
            .clone()
            .or_else(|| case_number_of(&self.data))
    }
}

/// Extract a non-empty `case_number` from a questionnaire payload
#[must_use]
pub fn case_number_of(data: &Value) -> Option<String> {
    data.get("case_number")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
