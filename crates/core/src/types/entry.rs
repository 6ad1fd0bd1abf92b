//! Waitlist entry record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Email, EntryStatus};

/// Suffix appended to the source of entries written by an offline sync pass.
pub const SYNCED_SOURCE_SUFFIX: &str = "-synced";

/// One waitlist signup.
///
/// Entries are immutable once written. The same shape is used for documents
/// read from the remote store and for signups parked in the offline queue,
/// so the field names follow the stored document layout (`userAgent`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistEntry {
    /// Normalized address.
    pub email: Email,
    /// Server-assigned time for synced entries, client time otherwise.
    /// Absent when a document was written without one.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: EntryStatus,
    #[serde(default)]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl WaitlistEntry {
    /// Create a pending entry stamped with the given client time.
    #[must_use]
    pub fn new(
        email: Email,
        source: impl Into<String>,
        user_agent: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            email,
            timestamp: Some(now),
            status: EntryStatus::Pending,
            source: source.into(),
            user_agent,
        }
    }

    /// Copy of this entry tagged as written by an offline sync pass.
    #[must_use]
    pub fn synced(&self) -> Self {
        Self {
            source: format!("{}{SYNCED_SOURCE_SUFFIX}", self.source),
            ..self.clone()
        }
    }
}

/// How the remote store should stamp a newly written entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampMode {
    /// Keep the entry's own client timestamp.
    Client,
    /// Replace it with the store's request time.
    Server,
}
