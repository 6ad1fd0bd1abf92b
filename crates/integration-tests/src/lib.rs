//! Integration tests for the Zynvo waitlist.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p zynvo-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `offline_sync` - Queueing while offline and delivering on reconnect
//! - `permission` - Sticky degraded mode after the store denies access
//! - `count` - Public count floors and caching
//! - `persistence` - Local state surviving a restart on disk
//! - `http_api` - The waitlist and admin routes end to end
//!
//! Everything runs against [`MemoryStore`], so no hosted store is needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, TimeZone, Utc};
use zynvo_core::{Email, WaitlistEntry, WaitlistStats};
use zynvo_site::config::SiteConfig;
use zynvo_site::routes;
use zynvo_site::services::waitlist::{FileBackend, LocalStore, MemoryStore, StorageError};
use zynvo_site::state::AppState;

/// Configuration with only the required variables set.
///
/// # Panics
///
/// Panics if the minimal configuration stops being accepted.
#[must_use]
pub fn test_config() -> SiteConfig {
    SiteConfig::from_lookup(|key| (key == "FIRESTORE_PROJECT_ID").then(|| "zynvo-test".to_string()))
        .expect("minimal configuration")
}

/// A file-backed local store under `dir`.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn file_store(dir: &Path) -> Result<LocalStore, StorageError> {
    let backend = FileBackend::open(dir.join("waitlist.json"))?;
    Ok(LocalStore::new(Arc::new(backend)))
}

/// A stored entry with a fixed timestamp.
///
/// # Panics
///
/// Panics if `email` is not a valid address.
#[must_use]
pub fn entry(email: &str, at: DateTime<Utc>) -> WaitlistEntry {
    WaitlistEntry::new(
        Email::normalize(email).expect("valid test email"),
        "website",
        None,
        at,
    )
}

/// Noon UTC on the given day.
#[must_use]
pub fn day(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Stats large enough to dominate the estimate.
#[must_use]
pub fn stats(total_count: u64) -> WaitlistStats {
    WaitlistStats {
        total_count,
        today_count: 0,
        last_updated: None,
    }
}

/// Application state wired to an in-process remote store.
pub struct TestHarness {
    pub remote: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestHarness {
    /// In-memory local store, online.
    #[must_use]
    pub fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()), LocalStore::in_memory())
    }

    /// Share an existing remote store, e.g. to simulate a restart.
    #[must_use]
    pub fn with_store(remote: Arc<MemoryStore>, store: LocalStore) -> Self {
        let state = AppState::new(test_config(), remote.clone(), store);
        Self { remote, state }
    }

    /// The full router, without Sentry layers.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(self.state.clone())
    }

    pub fn go_offline(&self) {
        self.state.connectivity().set_online(false);
    }

    pub fn go_online(&self) {
        self.state.connectivity().set_online(true);
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
