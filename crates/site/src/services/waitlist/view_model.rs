//! Presentation state for the waitlist.
//!
//! [`WaitlistViewModel`] publishes a [`WaitlistState`] over a `watch`
//! channel and keeps it current: it reacts to connectivity transitions,
//! loads the count once after a short grace period and pushes the offline
//! queue when the connection comes back.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};
use zynvo_core::SignupResult;

use super::connectivity::{ConnectivityEvent, ConnectivityEvents};
use super::repository::{SyncReport, WaitlistRepository};

/// Count shown before the first load completes.
pub const INITIAL_COUNT: u64 = 12_847;

/// Snapshot of what the page renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitlistState {
    pub count: u64,
    pub is_loading: bool,
    pub is_online: bool,
    pub has_loaded: bool,
    pub has_permission_error: bool,
}

/// Notice shown next to the signup form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    Offline,
    StoredLocally,
}

impl Advisory {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::Offline => {
                "You're offline. Email will be saved and synced when connection is restored."
            }
            Self::StoredLocally => "Your data is securely stored locally and protected.",
        }
    }
}

/// Delays used by [`WaitlistViewModel::mount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewModelConfig {
    /// Grace period before the first count load.
    pub initial_load_delay: Duration,
    /// Pause between coming back online and syncing.
    pub reconnect_sync_delay: Duration,
    /// Pause before the sync attempted at startup.
    pub startup_sync_delay: Duration,
}

impl Default for ViewModelConfig {
    fn default() -> Self {
        Self {
            initial_load_delay: Duration::from_millis(1000),
            reconnect_sync_delay: Duration::from_millis(1000),
            startup_sync_delay: Duration::from_millis(2000),
        }
    }
}

/// Reactive waitlist state. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct WaitlistViewModel {
    inner: Arc<Inner>,
}

struct Inner {
    repository: Arc<WaitlistRepository>,
    state: watch::Sender<WaitlistState>,
    config: ViewModelConfig,
}

impl std::fmt::Debug for WaitlistViewModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitlistViewModel")
            .field("state", &*self.inner.state.borrow())
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Background tasks started by [`WaitlistViewModel::mount`].
///
/// Dropping the handle stops them.
#[derive(Debug)]
pub struct MountHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for MountHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Clears `is_loading` however the signup future ends.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<WaitlistState>,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.state.send_modify(|state| state.is_loading = false);
    }
}

impl WaitlistViewModel {
    #[must_use]
    pub fn new(repository: Arc<WaitlistRepository>, config: ViewModelConfig) -> Self {
        let initial = WaitlistState {
            count: INITIAL_COUNT,
            is_loading: false,
            is_online: repository.connectivity().is_online(),
            has_loaded: false,
            has_permission_error: repository.has_permission_error(),
        };
        let (state, _) = watch::channel(initial);

        Self {
            inner: Arc::new(Inner {
                repository,
                state,
                config,
            }),
        }
    }

    #[must_use]
    pub fn repository(&self) -> &Arc<WaitlistRepository> {
        &self.inner.repository
    }

    #[must_use]
    pub fn snapshot(&self) -> WaitlistState {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WaitlistState> {
        self.inner.state.subscribe()
    }

    /// Current notice, if any. Being offline wins over degraded mode.
    #[must_use]
    pub fn advisory(&self) -> Option<Advisory> {
        let state = self.inner.state.borrow();
        if !state.is_online {
            Some(Advisory::Offline)
        } else if state.has_permission_error {
            Some(Advisory::StoredLocally)
        } else {
            None
        }
    }

    /// Start the connectivity listener, the delayed first load and the
    /// startup sync.
    #[must_use = "dropping the handle stops the background tasks"]
    pub fn mount(&self) -> MountHandle {
        // Subscribe before spawning so no transition after mount is missed.
        let events = self.inner.repository.connectivity().subscribe();

        let listener = tokio::spawn(self.clone().listen(events));

        let vm = self.clone();
        let initial_load = tokio::spawn(async move {
            tokio::time::sleep(vm.inner.config.initial_load_delay).await;
            vm.load_count().await;
        });

        let vm = self.clone();
        let startup_sync = tokio::spawn(async move {
            tokio::time::sleep(vm.inner.config.startup_sync_delay).await;
            let repository = &vm.inner.repository;
            if repository.connectivity().is_online() && !repository.has_permission_error() {
                vm.sync().await;
            }
        });

        MountHandle {
            tasks: vec![listener, initial_load, startup_sync],
        }
    }

    /// Refresh the count from the repository.
    pub async fn load_count(&self) {
        let count = self.inner.repository.get_waitlist_count().await;
        let has_permission_error = self.inner.repository.has_permission_error();

        tracing::debug!(count, has_permission_error, "Loaded waitlist count");
        self.inner.state.send_modify(|state| {
            state.count = count;
            state.has_loaded = true;
            state.has_permission_error = has_permission_error;
        });
    }

    /// Submit a signup, bumping the displayed count when it is accepted.
    pub async fn add_email(&self, email: &str, user_agent: Option<String>) -> SignupResult {
        self.inner.state.send_modify(|state| state.is_loading = true);
        let _loading = LoadingGuard {
            state: &self.inner.state,
        };

        let result = self
            .inner
            .repository
            .add_to_waitlist_with_agent(email, user_agent)
            .await;
        let has_permission_error = self.inner.repository.has_permission_error();

        self.inner.state.send_modify(|state| {
            if result.success {
                state.count = state.count.saturating_add(1);
            }
            state.has_permission_error = has_permission_error;
        });

        result
    }

    /// Push the offline queue, then refresh the count.
    pub async fn sync(&self) -> SyncReport {
        let report = self.inner.repository.sync_offline_emails().await;
        tracing::debug!(?report, "Sync pass finished");
        self.load_count().await;
        report
    }

    async fn listen(self, mut events: ConnectivityEvents) {
        // Reconnect syncs run alongside the listener and die with it.
        let mut pending = JoinSet::new();

        while let Some(event) = events.next().await {
            while pending.try_join_next().is_some() {}

            match event {
                ConnectivityEvent::Offline => {
                    self.inner.state.send_modify(|state| state.is_online = false);
                }
                ConnectivityEvent::Online => {
                    self.inner.state.send_modify(|state| state.is_online = true);

                    if self.inner.repository.has_permission_error() {
                        continue;
                    }

                    let vm = self.clone();
                    pending.spawn(async move {
                        tokio::time::sleep(vm.inner.config.reconnect_sync_delay).await;
                        vm.sync().await;
                    });
                }
            }
        }
    }
}
