//! Waitlist entry status.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a waitlist entry.
///
/// Every signup starts as `Pending`. The later states are set outside this
/// system (by whoever verifies addresses or sends launch notifications).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    #[default]
    Pending,
    Verified,
    Notified,
}

impl EntryStatus {
    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Verified => "verified",
            Self::Notified => "notified",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EntryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "verified" => Ok(Self::Verified),
            "notified" => Ok(Self::Notified),
            _ => Err(format!("invalid entry status: {s}")),
        }
    }
}
