//! Waitlist repository.
//!
//! Owns every read and write against the remote store, the local count
//! cache, the offline queue and the permission-error flag. Each public
//! operation picks one of three modes before doing anything:
//!
//! 1. **Degraded** - the remote store rejected us earlier (flag set): serve
//!    reads from the cache, park writes in the offline queue.
//! 2. **Offline** - same as degraded.
//! 3. **Online** - talk to the remote store.
//!
//! No operation returns an error. Every path resolves to a best-effort value,
//! and authorization failures are the only ones that leave state behind (the
//! flag). Connectivity is re-checked on every call.
//!
//! The count reported to callers is always `authoritative_or_cached +
//! queue_len`, so a visitor's own pending signup shows up immediately without
//! ever being counted twice by the remote store.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tracing::instrument;
use zynvo_core::{
    Email, QueueReason, SignupOutcome, SignupResult, TimestampMode, WaitlistEntry,
};

use super::connectivity::ConnectivityProbe;
use super::estimator::CountEstimator;
use super::remote::{RemoteError, RemoteStore};
use super::storage::LocalStore;

/// Local storage keys.
pub mod keys {
    pub const OFFLINE_EMAILS: &str = "zynvo_offline_emails";
    pub const CACHED_COUNT: &str = "zynvo_cached_count";
    pub const LAST_SYNC: &str = "zynvo_last_sync";
    pub const PERMISSION_ERROR: &str = "zynvo_permission_error";
    pub const PERMISSION_ERROR_AT: &str = "zynvo_permission_error_at";
}

pub const STORED_MESSAGE: &str = "Successfully added to waitlist!";
pub const OFFLINE_MESSAGE: &str =
    "You're offline. Your email has been saved and will sync when the connection is restored.";
pub const DEGRADED_MESSAGE: &str =
    "You're on the list! Your data is securely stored locally and protected.";
pub const INVALID_EMAIL_MESSAGE: &str = "Please enter a valid email address.";
pub const FAILED_MESSAGE: &str =
    "Failed to add to waitlist. Your email was saved and will be submitted automatically.";

/// Default `source` tag for new signups.
pub const DEFAULT_SOURCE: &str = "website";

/// Tunables for [`WaitlistRepository`].
#[derive(Debug, Clone)]
pub struct RepositoryOptions {
    /// `source` recorded on new entries.
    pub source: String,
    /// How long a raised permission flag forces degraded mode. `None` keeps it
    /// until an operation succeeds or an operator resets it.
    pub permission_retry_after: Option<TimeDelta>,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            permission_retry_after: None,
        }
    }
}

/// Which branch an operation takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Degraded,
    Offline,
    Online,
}

/// How a sync pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every queued entry was written or already present.
    Completed,
    /// Some entries failed transiently and stay queued.
    Incomplete,
    /// The queue was empty.
    NothingToSync,
    SkippedOffline,
    SkippedPermissionError,
    /// Another pass was already in progress.
    AlreadyRunning,
    /// The store denied access mid-pass; the rest stays queued.
    AbortedPermissionDenied,
}

/// Summary of one [`WaitlistRepository::sync_offline_emails`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    /// Entries written to the remote store.
    pub synced: usize,
    /// Entries skipped because the email was already stored.
    pub already_present: usize,
    /// Entries whose write failed transiently.
    pub failed: usize,
    /// Queue length after the pass.
    pub remaining: usize,
}

impl SyncReport {
    const fn skipped(status: SyncStatus, remaining: usize) -> Self {
        Self {
            status,
            synced: 0,
            already_present: 0,
            failed: 0,
            remaining,
        }
    }
}

/// Data-access layer for the waitlist.
pub struct WaitlistRepository {
    remote: Arc<dyn RemoteStore>,
    store: LocalStore,
    connectivity: ConnectivityProbe,
    estimator: CountEstimator,
    options: RepositoryOptions,
    sync_lock: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for WaitlistRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitlistRepository")
            .field("connectivity", &self.connectivity)
            .field("estimator", &self.estimator)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl WaitlistRepository {
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        store: LocalStore,
        connectivity: ConnectivityProbe,
    ) -> Self {
        Self {
            remote,
            store,
            connectivity,
            estimator: CountEstimator::default(),
            options: RepositoryOptions::default(),
            sync_lock: tokio::sync::Mutex::new(()),
        }
    }

    #[must_use]
    pub const fn with_estimator(mut self, estimator: CountEstimator) -> Self {
        self.estimator = estimator;
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: RepositoryOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub const fn connectivity(&self) -> &ConnectivityProbe {
        &self.connectivity
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Sign `email` up for the waitlist.
    #[instrument(skip(self))]
    pub async fn add_to_waitlist(&self, email: &str) -> SignupResult {
        self.add_to_waitlist_with_agent(email, None).await
    }

    /// Sign `email` up, recording the visitor's user agent.
    ///
    /// Online, the entry is written directly and the stats aggregate bumped.
    /// Offline or degraded, it goes to the offline queue. A failed online
    /// write is reported as a failure but the entry is still queued, so the
    /// next sync pass can deliver it.
    #[instrument(skip(self, user_agent))]
    pub async fn add_to_waitlist_with_agent(
        &self,
        email: &str,
        user_agent: Option<String>,
    ) -> SignupResult {
        let email = match Email::normalize(email) {
            Ok(email) => email,
            Err(e) => {
                tracing::debug!(error = %e, "Rejected signup");
                return SignupResult::new(SignupOutcome::InvalidEmail, INVALID_EMAIL_MESSAGE);
            }
        };
        let entry = WaitlistEntry::new(email, &self.options.source, user_agent, Utc::now());

        match self.mode() {
            Mode::Degraded => {
                self.enqueue(entry);
                return SignupResult::new(
                    SignupOutcome::Queued(QueueReason::Degraded),
                    DEGRADED_MESSAGE,
                );
            }
            Mode::Offline => {
                self.enqueue(entry);
                return SignupResult::new(
                    SignupOutcome::Queued(QueueReason::Offline),
                    OFFLINE_MESSAGE,
                );
            }
            Mode::Online => {}
        }

        match self.remote.add_entry(&entry, TimestampMode::Client).await {
            Ok(id) => {
                tracing::info!(email = %entry.email, id = %id, "Added email to waitlist");
                self.clear_permission_error();
                self.bump_stats().await;
                SignupResult::new(SignupOutcome::Stored, STORED_MESSAGE)
            }
            Err(e) => {
                tracing::error!(email = %entry.email, error = %e, "Error adding to waitlist");
                let outcome = if e.is_permission_denied() {
                    self.set_permission_error();
                    SignupOutcome::AuthorizationFailure
                } else {
                    SignupOutcome::TransientFailure
                };
                self.enqueue(entry);
                SignupResult::new(outcome, FAILED_MESSAGE)
            }
        }
    }

    /// Public signup count, including locally queued signups.
    #[instrument(skip(self))]
    pub async fn get_waitlist_count(&self) -> u64 {
        let base = match self.mode() {
            Mode::Degraded | Mode::Offline => self.cached_or_estimate(),
            Mode::Online => match self.authoritative_count().await {
                Ok(authoritative) => {
                    let count = authoritative.max(self.estimator.estimate());
                    self.store.set(keys::CACHED_COUNT, &count);
                    self.clear_permission_error();
                    count
                }
                Err(e) => {
                    if e.is_permission_denied() {
                        tracing::info!("Permission denied - using local count generation");
                        self.set_permission_error();
                    } else {
                        tracing::warn!(error = %e, "Error getting waitlist count");
                    }
                    self.cached_or_estimate()
                }
            },
        };

        base.saturating_add(self.queue_len() as u64)
    }

    /// Push queued signups to the remote store.
    ///
    /// Safe to call repeatedly: entries whose email is already stored are
    /// dropped from the queue without a second write, and overlapping calls
    /// collapse into one pass.
    #[instrument(skip(self))]
    pub async fn sync_offline_emails(&self) -> SyncReport {
        match self.mode() {
            Mode::Offline => {
                return SyncReport::skipped(SyncStatus::SkippedOffline, self.queue_len());
            }
            Mode::Degraded => {
                return SyncReport::skipped(SyncStatus::SkippedPermissionError, self.queue_len());
            }
            Mode::Online => {}
        }

        let Ok(_guard) = self.sync_lock.try_lock() else {
            return SyncReport::skipped(SyncStatus::AlreadyRunning, self.queue_len());
        };

        let queue = self.offline_queue();
        if queue.is_empty() {
            return SyncReport::skipped(SyncStatus::NothingToSync, 0);
        }

        tracing::info!(queued = queue.len(), "Attempting to sync offline emails");

        let mut report = SyncReport::skipped(SyncStatus::Completed, 0);
        let mut processed = HashSet::new();

        for entry in &queue {
            if processed.contains(&entry.email) {
                report.already_present += 1;
                continue;
            }

            match self.remote.email_exists(&entry.email).await {
                Ok(true) => {
                    report.already_present += 1;
                    processed.insert(entry.email.clone());
                    continue;
                }
                Ok(false) => {}
                Err(e) if e.is_permission_denied() => {
                    return self.abort_sync(report, &processed);
                }
                Err(e) => {
                    // Unknown is treated as absent; a duplicate is cheaper
                    // than a lost signup.
                    tracing::warn!(email = %entry.email, error = %e, "Existence check failed");
                }
            }

            match self.remote.add_entry(&entry.synced(), TimestampMode::Server).await {
                Ok(_) => {
                    report.synced += 1;
                    processed.insert(entry.email.clone());
                    self.bump_stats().await;
                }
                Err(e) if e.is_permission_denied() => {
                    return self.abort_sync(report, &processed);
                }
                Err(e) => {
                    tracing::error!(email = %entry.email, error = %e, "Error syncing email");
                    report.failed += 1;
                }
            }
        }

        report.remaining = self.remove_from_queue(&processed);

        if report.failed == 0 {
            self.store.set(keys::LAST_SYNC, &Utc::now());
        } else {
            report.status = SyncStatus::Incomplete;
        }

        if report.synced > 0 {
            tracing::info!(synced = report.synced, "Successfully synced emails");
            let count = self.get_waitlist_count().await;
            tracing::debug!(count, "Refreshed count after sync");
        }

        report
    }

    /// Every stored entry, newest first.
    ///
    /// Empty when offline, degraded, or on any remote failure.
    #[instrument(skip(self))]
    pub async fn get_all_waitlist_entries(&self) -> Vec<WaitlistEntry> {
        if self.mode() != Mode::Online {
            return Vec::new();
        }

        match self.remote.list_entries().await {
            Ok(mut entries) => {
                self.clear_permission_error();
                // Stable, so equal timestamps keep store order; missing
                // timestamps sort last.
                entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                entries
            }
            Err(e) => {
                tracing::error!(error = %e, "Error getting waitlist entries");
                if e.is_permission_denied() {
                    self.set_permission_error();
                }
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Local state
    // =========================================================================

    /// Whether the permission-error flag is raised.
    #[must_use]
    pub fn has_permission_error(&self) -> bool {
        self.store.get(keys::PERMISSION_ERROR, false)
    }

    /// Clear the permission-error flag by hand.
    pub fn reset_permission_error(&self) {
        tracing::info!("Permission error flag reset");
        self.store.set(keys::PERMISSION_ERROR, &false);
        self.store.remove(keys::PERMISSION_ERROR_AT);
    }

    /// Signups waiting to be synced, oldest first.
    #[must_use]
    pub fn offline_queue(&self) -> Vec<WaitlistEntry> {
        self.store.get(keys::OFFLINE_EMAILS, Vec::new())
    }

    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.offline_queue().len()
    }

    /// Last known-good count, without the queue.
    #[must_use]
    pub fn cached_count(&self) -> Option<u64> {
        self.store.get_opt(keys::CACHED_COUNT)
    }

    /// When the queue was last flushed completely.
    #[must_use]
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.store.get_opt(keys::LAST_SYNC)
    }

    fn mode(&self) -> Mode {
        if self.permission_error_active() {
            Mode::Degraded
        } else if !self.connectivity.is_online() {
            Mode::Offline
        } else {
            Mode::Online
        }
    }

    fn permission_error_active(&self) -> bool {
        if !self.has_permission_error() {
            return false;
        }
        let Some(window) = self.options.permission_retry_after else {
            return true;
        };
        self.store
            .get_opt::<DateTime<Utc>>(keys::PERMISSION_ERROR_AT)
            .is_none_or(|raised| Utc::now() - raised < window)
    }

    fn set_permission_error(&self) {
        self.store.set(keys::PERMISSION_ERROR, &true);
        self.store.set(keys::PERMISSION_ERROR_AT, &Utc::now());
    }

    fn clear_permission_error(&self) {
        if self.has_permission_error() {
            tracing::info!("Remote store accepted us again, leaving degraded mode");
            self.store.set(keys::PERMISSION_ERROR, &false);
            self.store.remove(keys::PERMISSION_ERROR_AT);
        }
    }

    fn cached_or_estimate(&self) -> u64 {
        if let Some(cached) = self.cached_count() {
            return cached;
        }
        let generated = self.estimator.estimate();
        self.store.set(keys::CACHED_COUNT, &generated);
        generated
    }

    async fn authoritative_count(&self) -> Result<u64, RemoteError> {
        if let Some(stats) = self.remote.fetch_stats().await? {
            return Ok(stats.total_count);
        }
        self.remote.count_entries().await
    }

    /// Best effort; a stale aggregate only affects the public number.
    async fn bump_stats(&self) {
        if let Err(e) = self.remote.increment_stats().await {
            tracing::warn!(error = %e, "Error updating waitlist stats");
        }
    }

    fn enqueue(&self, entry: WaitlistEntry) {
        let mut queue = self.offline_queue();
        tracing::info!(email = %entry.email, queued = queue.len() + 1, "Queued signup locally");
        queue.push(entry);
        self.store.set(keys::OFFLINE_EMAILS, &queue);
    }

    /// Drop processed emails from the queue as it is now (entries queued
    /// during the pass survive). Returns the new length.
    fn remove_from_queue(&self, processed: &HashSet<Email>) -> usize {
        let mut queue = self.offline_queue();
        if processed.is_empty() {
            return queue.len();
        }
        queue.retain(|entry| !processed.contains(&entry.email));
        self.store.set(keys::OFFLINE_EMAILS, &queue);
        queue.len()
    }

    fn abort_sync(&self, mut report: SyncReport, processed: &HashSet<Email>) -> SyncReport {
        tracing::info!("Permission denied during sync - stopping sync process");
        self.set_permission_error();
        report.status = SyncStatus::AbortedPermissionDenied;
        report.remaining = self.remove_from_queue(processed);
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use zynvo_core::{EntryStatus, WaitlistStats};

    use super::*;
    use crate::services::waitlist::estimator::DEFAULT_BASE;
    use crate::services::waitlist::remote::{Failure, MemoryStore, Operation};

    struct Harness {
        remote: Arc<MemoryStore>,
        probe: ConnectivityProbe,
        repo: WaitlistRepository,
    }

    fn harness() -> Harness {
        let remote = Arc::new(MemoryStore::new());
        let probe = ConnectivityProbe::new(true);
        let repo = WaitlistRepository::new(remote.clone(), LocalStore::in_memory(), probe.clone());
        Harness {
            remote,
            probe,
            repo,
        }
    }

    fn stored(email: &str, day: u32) -> WaitlistEntry {
        WaitlistEntry::new(
            Email::parse(email).unwrap(),
            "website",
            None,
            Utc.with_ymd_and_hms(2025, 1, day, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_online_add_writes_entry_and_stats() {
        let h = harness();

        let result = h
            .repo
            .add_to_waitlist_with_agent(" New@Example.com", Some("Mozilla/5.0".to_string()))
            .await;

        assert!(result.success);
        assert_eq!(result.message, STORED_MESSAGE);
        assert_eq!(result.outcome, SignupOutcome::Stored);

        let entries = h.remote.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].email.as_str(), "new@example.com");
        assert_eq!(entries[0].status, EntryStatus::Pending);
        assert_eq!(entries[0].source, DEFAULT_SOURCE);
        assert_eq!(entries[0].user_agent.as_deref(), Some("Mozilla/5.0"));
        assert_eq!(h.remote.stats().unwrap().total_count, 1);
        assert_eq!(h.repo.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_invalid_email_has_no_side_effects() {
        let h = harness();

        let result = h.repo.add_to_waitlist("not-an-email").await;

        assert!(!result.success);
        assert_eq!(result.outcome, SignupOutcome::InvalidEmail);
        assert_eq!(h.remote.calls(Operation::AddEntry), 0);
        assert_eq!(h.repo.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_offline_add_queues() {
        let h = harness();
        h.probe.set_online(false);

        let result = h.repo.add_to_waitlist("user@example.com").await;

        assert!(result.success);
        assert_eq!(result.outcome, SignupOutcome::Queued(QueueReason::Offline));
        assert_eq!(h.remote.calls(Operation::AddEntry), 0);
        assert_eq!(h.repo.offline_queue()[0].email.as_str(), "user@example.com");
    }

    fn day_zero(h: Harness) -> Harness {
        let estimator = CountEstimator::new(DEFAULT_BASE, Utc::now().date_naive());
        Harness {
            repo: h.repo.with_estimator(estimator),
            ..h
        }
    }

    #[tokio::test]
    async fn test_offline_count_on_start_day_is_near_base() {
        let h = day_zero(harness());
        h.probe.set_online(false);

        let count = h.repo.get_waitlist_count().await;

        assert!((DEFAULT_BASE..DEFAULT_BASE + 50).contains(&count));
        assert_eq!(h.repo.cached_count(), Some(count));
        assert_eq!(h.remote.calls(Operation::FetchStats), 0);
    }

    #[tokio::test]
    async fn test_offline_add_normalizes_and_bumps_count_by_one() {
        let h = day_zero(harness());
        h.probe.set_online(false);
        let before = h.repo.get_waitlist_count().await;

        let result = h.repo.add_to_waitlist("  USER@Example.com ").await;

        assert!(result.success);
        let queue = h.repo.offline_queue();
        assert_eq!(queue.len(), 1);
        assert_eq!(queue[0].email.as_str(), "user@example.com");
        assert_eq!(h.repo.get_waitlist_count().await, before + 1);
    }

    #[tokio::test]
    async fn test_transient_failure_queues_without_flag() {
        let h = harness();
        h.remote.fail(Operation::AddEntry, Failure::Network);

        let result = h.repo.add_to_waitlist("user@example.com").await;

        assert!(!result.success);
        assert_eq!(result.outcome, SignupOutcome::TransientFailure);
        assert!(!h.repo.has_permission_error());
        assert_eq!(h.repo.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_permission_failure_raises_flag_and_degrades() {
        let h = harness();
        h.remote.fail(Operation::AddEntry, Failure::PermissionDenied);

        let result = h.repo.add_to_waitlist("user@example.com").await;
        assert_eq!(result.outcome, SignupOutcome::AuthorizationFailure);
        assert!(h.repo.has_permission_error());

        let result = h.repo.add_to_waitlist("second@example.com").await;
        assert!(result.success);
        assert_eq!(result.outcome, SignupOutcome::Queued(QueueReason::Degraded));
        assert_eq!(result.message, DEGRADED_MESSAGE);
        assert_eq!(h.remote.calls(Operation::AddEntry), 1);
        assert_eq!(h.repo.queue_len(), 2);
    }

    #[tokio::test]
    async fn test_count_prefers_stats_over_collection() {
        let h = harness();
        h.remote.set_stats(Some(WaitlistStats {
            total_count: 1_000_000,
            ..WaitlistStats::default()
        }));

        assert_eq!(h.repo.get_waitlist_count().await, 1_000_000);
        assert_eq!(h.remote.calls(Operation::CountEntries), 0);
        assert_eq!(h.repo.cached_count(), Some(1_000_000));
    }

    #[tokio::test]
    async fn test_count_falls_back_to_collection_and_estimate_floor() {
        let h = harness();
        h.remote.insert(stored("a@example.com", 1));

        let count = h.repo.get_waitlist_count().await;

        assert_eq!(h.remote.calls(Operation::CountEntries), 1);
        // One real entry never beats the estimator.
        assert!(count > 12_847);
        assert_eq!(h.repo.cached_count(), Some(count));
    }

    #[tokio::test]
    async fn test_count_failure_uses_cache() {
        let h = harness();
        h.remote.set_stats(Some(WaitlistStats {
            total_count: 2_000_000,
            ..WaitlistStats::default()
        }));
        assert_eq!(h.repo.get_waitlist_count().await, 2_000_000);

        h.remote.fail(Operation::FetchStats, Failure::Network);
        assert_eq!(h.repo.get_waitlist_count().await, 2_000_000);
        assert!(!h.repo.has_permission_error());
    }

    #[tokio::test]
    async fn test_count_success_clears_flag_after_retry_window() {
        let remote = Arc::new(MemoryStore::new());
        let repo = WaitlistRepository::new(
            remote.clone(),
            LocalStore::in_memory(),
            ConnectivityProbe::new(true),
        )
        .with_options(RepositoryOptions {
            permission_retry_after: Some(TimeDelta::zero()),
            ..RepositoryOptions::default()
        });

        remote.fail(Operation::ListEntries, Failure::PermissionDenied);
        assert!(repo.get_all_waitlist_entries().await.is_empty());
        assert!(repo.has_permission_error());

        // Window already elapsed, so the next read probes the store again.
        repo.get_waitlist_count().await;
        assert!(!repo.has_permission_error());
    }

    #[tokio::test]
    async fn test_sync_writes_with_synced_source() {
        let h = harness();
        h.probe.set_online(false);
        h.repo.add_to_waitlist("a@example.com").await;
        h.repo.add_to_waitlist("b@example.com").await;
        h.probe.set_online(true);

        let report = h.repo.sync_offline_emails().await;

        assert_eq!(report.status, SyncStatus::Completed);
        assert_eq!(report.synced, 2);
        assert_eq!(report.remaining, 0);
        assert!(h.repo.last_sync().is_some());
        assert!(
            h.remote
                .entries()
                .iter()
                .all(|e| e.source == "website-synced")
        );
    }

    #[tokio::test]
    async fn test_sync_skips_existing_and_duplicate_queue_entries() {
        let h = harness();
        h.remote.insert(stored("a@example.com", 1));
        h.probe.set_online(false);
        h.repo.add_to_waitlist("a@example.com").await;
        h.repo.add_to_waitlist("b@example.com").await;
        h.repo.add_to_waitlist("b@example.com").await;
        h.probe.set_online(true);

        let report = h.repo.sync_offline_emails().await;

        assert_eq!(report.synced, 1);
        assert_eq!(report.already_present, 2);
        assert_eq!(h.remote.entries().len(), 2);
        assert_eq!(h.repo.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_sync_keeps_transient_failures_queued() {
        let h = harness();
        h.probe.set_online(false);
        h.repo.add_to_waitlist("a@example.com").await;
        h.repo.add_to_waitlist("b@example.com").await;
        h.probe.set_online(true);
        h.remote.fail_after(Operation::AddEntry, 1, Failure::Network);

        let report = h.repo.sync_offline_emails().await;

        assert_eq!(report.status, SyncStatus::Incomplete);
        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(h.repo.offline_queue()[0].email.as_str(), "b@example.com");
        assert!(h.repo.last_sync().is_none());
    }

    #[tokio::test]
    async fn test_sync_aborts_on_permission_denied() {
        let h = harness();
        h.probe.set_online(false);
        for email in ["a@example.com", "b@example.com", "c@example.com"] {
            h.repo.add_to_waitlist(email).await;
        }
        h.probe.set_online(true);
        h.remote
            .fail_after(Operation::AddEntry, 1, Failure::PermissionDenied);

        let report = h.repo.sync_offline_emails().await;

        assert_eq!(report.status, SyncStatus::AbortedPermissionDenied);
        assert_eq!(report.synced, 1);
        assert_eq!(report.remaining, 2);
        // Third entry was never attempted.
        assert_eq!(h.remote.calls(Operation::AddEntry), 2);
        assert_eq!(h.remote.calls(Operation::EmailExists), 2);
        assert!(h.repo.has_permission_error());

        let report = h.repo.sync_offline_emails().await;
        assert_eq!(report.status, SyncStatus::SkippedPermissionError);
    }

    #[tokio::test]
    async fn test_sync_noop_when_offline_or_empty() {
        let h = harness();
        assert_eq!(
            h.repo.sync_offline_emails().await.status,
            SyncStatus::NothingToSync
        );

        h.probe.set_online(false);
        assert_eq!(
            h.repo.sync_offline_emails().await.status,
            SyncStatus::SkippedOffline
        );
        assert_eq!(h.remote.calls(Operation::EmailExists), 0);
    }

    #[tokio::test]
    async fn test_entries_sorted_newest_first() {
        let h = harness();
        let mut undated = stored("undated@example.com", 1);
        undated.timestamp = None;
        h.remote.insert(stored("old@example.com", 1));
        h.remote.insert(undated);
        h.remote.insert(stored("new@example.com", 9));
        h.remote.insert(stored("tie@example.com", 9));

        let emails: Vec<_> = h
            .repo
            .get_all_waitlist_entries()
            .await
            .into_iter()
            .map(|e| e.email.into_inner())
            .collect();

        assert_eq!(
            emails,
            [
                "new@example.com",
                "tie@example.com",
                "old@example.com",
                "undated@example.com"
            ]
        );
    }

    #[tokio::test]
    async fn test_entries_empty_when_offline() {
        let h = harness();
        h.remote.insert(stored("a@example.com", 1));
        h.probe.set_online(false);

        assert!(h.repo.get_all_waitlist_entries().await.is_empty());
        assert_eq!(h.remote.calls(Operation::ListEntries), 0);
    }

    #[tokio::test]
    async fn test_denied_listing_degrades_next_count() {
        let h = harness();
        h.remote.fail(Operation::ListEntries, Failure::PermissionDenied);

        assert!(h.repo.get_all_waitlist_entries().await.is_empty());
        assert!(h.repo.has_permission_error());

        let count = h.repo.get_waitlist_count().await;

        assert!(count >= DEFAULT_BASE);
        assert_eq!(h.remote.calls(Operation::FetchStats), 0);
        assert_eq!(h.remote.calls(Operation::CountEntries), 0);
    }

    #[tokio::test]
    async fn test_reset_permission_error() {
        let h = harness();
        h.remote.fail(Operation::ListEntries, Failure::PermissionDenied);
        h.repo.get_all_waitlist_entries().await;
        assert!(h.repo.has_permission_error());

        h.repo.reset_permission_error();
        assert!(!h.repo.has_permission_error());
    }
}
