//! Waitlist aggregate statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Singleton aggregate kept next to the waitlist collection.
///
/// Created lazily by the first successful signup and bumped by atomic
/// increments afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistStats {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub today_count: u64,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}
