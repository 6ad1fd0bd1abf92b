//! Remote document store seam.
//!
//! The waitlist layer only needs a handful of collection-scoped operations
//! from the hosted database. [`RemoteStore`] names them; the Firestore REST
//! client implements it for production and [`MemoryStore`] implements it
//! in-process, with failure injection, for tests and local runs.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;
use uuid::Uuid;
use zynvo_core::{Email, TimestampMode, WaitlistEntry, WaitlistStats};

/// Errors returned by a remote store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The store refused the caller's credentials or rules.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The store could not be reached.
    #[error("Network error: {0}")]
    Network(String),

    /// The addressed document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// The response did not have the expected shape.
    #[error("Decode error: {0}")]
    Decode(String),
}

impl RemoteError {
    /// Authorization failures are the only ones that persist state.
    #[must_use]
    pub const fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }
}

/// Operations the waitlist layer performs against the hosted database.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Create a new document in the waitlist collection, returning its id.
    async fn add_entry(
        &self,
        entry: &WaitlistEntry,
        timestamp: TimestampMode,
    ) -> Result<String, RemoteError>;

    /// Whether an entry with exactly this email exists.
    async fn email_exists(&self, email: &Email) -> Result<bool, RemoteError>;

    /// Read the stats aggregate, `None` when it has not been created yet.
    async fn fetch_stats(&self) -> Result<Option<WaitlistStats>, RemoteError>;

    /// Count the documents in the waitlist collection.
    async fn count_entries(&self) -> Result<u64, RemoteError>;

    /// Fetch every entry, in store order.
    async fn list_entries(&self) -> Result<Vec<WaitlistEntry>, RemoteError>;

    /// Atomically bump the stats aggregate, creating it if missing.
    async fn increment_stats(&self) -> Result<(), RemoteError>;

    /// Whether the store answers at all, regardless of authorization.
    async fn is_reachable(&self) -> bool {
        true
    }
}

// =============================================================================
// MemoryStore
// =============================================================================

/// Remote operation names, used to target injected failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AddEntry,
    EmailExists,
    FetchStats,
    CountEntries,
    ListEntries,
    IncrementStats,
}

/// Failure kinds [`MemoryStore`] can inject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    PermissionDenied,
    Network,
}

impl Failure {
    fn to_error(self, op: Operation) -> RemoteError {
        match self {
            Self::PermissionDenied => {
                RemoteError::PermissionDenied(format!("{op:?}: missing or insufficient permissions"))
            }
            Self::Network => RemoteError::Network(format!("{op:?}: connection refused")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct FailureRule {
    failure: Failure,
    after: usize,
}

#[derive(Debug)]
struct MemoryState {
    entries: Vec<(String, WaitlistEntry)>,
    stats: Option<WaitlistStats>,
    reachable: bool,
    failures: HashMap<Operation, FailureRule>,
    calls: HashMap<Operation, usize>,
}

/// In-process remote store.
///
/// Server timestamps are the wall clock at write time. While unreachable,
/// every operation fails with [`RemoteError::Network`].
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                entries: Vec::new(),
                stats: None,
                reachable: true,
                failures: HashMap::new(),
                calls: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `op` fail with `failure` from now on.
    pub fn fail(&self, op: Operation, failure: Failure) {
        self.fail_after(op, 0, failure);
    }

    /// Let `op` succeed `successes` more times, then fail with `failure`.
    pub fn fail_after(&self, op: Operation, successes: usize, failure: Failure) {
        let mut state = self.lock();
        let after = state.calls.get(&op).copied().unwrap_or(0) + successes;
        state.failures.insert(op, FailureRule { failure, after });
    }

    /// Make every operation fail with `failure`.
    pub fn fail_all(&self, failure: Failure) {
        for op in [
            Operation::AddEntry,
            Operation::EmailExists,
            Operation::FetchStats,
            Operation::CountEntries,
            Operation::ListEntries,
            Operation::IncrementStats,
        ] {
            self.fail(op, failure);
        }
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.lock().reachable = reachable;
    }

    /// Seed an entry as if it had been written earlier.
    pub fn insert(&self, entry: WaitlistEntry) {
        self.lock()
            .entries
            .push((Uuid::new_v4().to_string(), entry));
    }

    pub fn set_stats(&self, stats: Option<WaitlistStats>) {
        self.lock().stats = stats;
    }

    /// Snapshot of stored entries, in insertion order.
    #[must_use]
    pub fn entries(&self) -> Vec<WaitlistEntry> {
        self.lock()
            .entries
            .iter()
            .map(|(_, entry)| entry.clone())
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> Option<WaitlistStats> {
        self.lock().stats.clone()
    }

    /// How many times `op` has been attempted.
    #[must_use]
    pub fn calls(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Count the call and decide whether it fails.
    fn begin(&self, op: Operation) -> Result<MutexGuard<'_, MemoryState>, RemoteError> {
        let mut state = self.lock();
        let calls = state.calls.entry(op).or_insert(0);
        *calls += 1;
        let attempt = *calls;

        if !state.reachable {
            return Err(Failure::Network.to_error(op));
        }
        if let Some(rule) = state.failures.get(&op)
            && attempt > rule.after
        {
            return Err(rule.failure.to_error(op));
        }
        Ok(state)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn add_entry(
        &self,
        entry: &WaitlistEntry,
        timestamp: TimestampMode,
    ) -> Result<String, RemoteError> {
        let mut state = self.begin(Operation::AddEntry)?;
        let mut stored = entry.clone();
        if timestamp == TimestampMode::Server {
            stored.timestamp = Some(Utc::now());
        }
        let id = Uuid::new_v4().to_string();
        state.entries.push((id.clone(), stored));
        Ok(id)
    }

    async fn email_exists(&self, email: &Email) -> Result<bool, RemoteError> {
        let state = self.begin(Operation::EmailExists)?;
        Ok(state.entries.iter().any(|(_, entry)| &entry.email == email))
    }

    async fn fetch_stats(&self) -> Result<Option<WaitlistStats>, RemoteError> {
        let state = self.begin(Operation::FetchStats)?;
        Ok(state.stats.clone())
    }

    async fn count_entries(&self) -> Result<u64, RemoteError> {
        let state = self.begin(Operation::CountEntries)?;
        Ok(state.entries.len() as u64)
    }

    async fn list_entries(&self) -> Result<Vec<WaitlistEntry>, RemoteError> {
        let state = self.begin(Operation::ListEntries)?;
        Ok(state.entries.iter().map(|(_, entry)| entry.clone()).collect())
    }

    async fn increment_stats(&self) -> Result<(), RemoteError> {
        let mut state = self.begin(Operation::IncrementStats)?;
        let stats = state.stats.get_or_insert_with(WaitlistStats::default);
        stats.total_count += 1;
        stats.today_count += 1;
        stats.last_updated = Some(Utc::now());
        Ok(())
    }

    async fn is_reachable(&self) -> bool {
        self.lock().reachable
    }
}
