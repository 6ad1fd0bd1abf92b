//! Result of a waitlist signup attempt.

use serde::{Deserialize, Serialize};

/// Why a signup was parked in the offline queue instead of written remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueReason {
    /// No connectivity to the remote store.
    Offline,
    /// The remote store previously rejected us; working from local state.
    Degraded,
}

/// Tagged cause behind a [`SignupResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum SignupOutcome {
    /// Written to the remote store.
    Stored,
    /// Saved locally, to be synced later.
    Queued(QueueReason),
    /// The address failed validation; nothing was saved.
    InvalidEmail,
    /// The remote write failed for a transient reason. The entry was queued.
    TransientFailure,
    /// The remote store denied the write. The entry was queued and the
    /// permission-error flag raised.
    AuthorizationFailure,
}

impl SignupOutcome {
    /// Whether the signup should be reported to the user as successful.
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Stored | Self::Queued(_))
    }
}

/// Value returned to presentation for every signup attempt.
///
/// `success` and `message` are what the form shows; `outcome` lets callers
/// branch on the cause without parsing the message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupResult {
    pub success: bool,
    pub message: String,
    pub outcome: SignupOutcome,
}

impl SignupResult {
    /// Build a result whose `success` flag follows from the outcome.
    #[must_use]
    pub fn new(outcome: SignupOutcome, message: impl Into<String>) -> Self {
        Self {
            success: outcome.is_success(),
            message: message.into(),
            outcome,
        }
    }
}
