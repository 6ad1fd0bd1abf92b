//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::SiteConfig;
use crate::firestore::FirestoreClient;
use crate::services::waitlist::{
    ConnectivityProbe, FileBackend, LocalStore, RemoteError, RemoteStore, StorageError,
    WaitlistRepository, WaitlistViewModel,
};

/// Error wiring up the waitlist stack.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("remote store: {0}")]
    Remote(#[from] RemoteError),
    #[error("local storage: {0}")]
    Storage(#[from] StorageError),
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SiteConfig,
    remote: Arc<dyn RemoteStore>,
    view_model: WaitlistViewModel,
}

impl AppState {
    /// Assemble state around an existing remote store and local store.
    #[must_use]
    pub fn new(config: SiteConfig, remote: Arc<dyn RemoteStore>, store: LocalStore) -> Self {
        let repository = WaitlistRepository::new(
            Arc::clone(&remote),
            store,
            ConnectivityProbe::new(true),
        )
        .with_options(config.waitlist.repository_options());
        let view_model =
            WaitlistViewModel::new(Arc::new(repository), config.waitlist.view_model_config());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                remote,
                view_model,
            }),
        }
    }

    /// Firestore remote plus the file-backed local store from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the storage
    /// directory cannot be created.
    pub fn from_config(config: SiteConfig) -> Result<Self, StartupError> {
        let remote: Arc<dyn RemoteStore> = Arc::new(FirestoreClient::new(&config.firestore)?);
        let backend = FileBackend::open(&config.storage_path)?;
        tracing::info!(path = %config.storage_path.display(), "Local storage opened");

        Ok(Self::new(config, remote, LocalStore::new(Arc::new(backend))))
    }

    #[must_use]
    pub fn config(&self) -> &SiteConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn remote(&self) -> &Arc<dyn RemoteStore> {
        &self.inner.remote
    }

    #[must_use]
    pub fn view_model(&self) -> &WaitlistViewModel {
        &self.inner.view_model
    }

    #[must_use]
    pub fn repository(&self) -> &WaitlistRepository {
        self.inner.view_model.repository()
    }

    #[must_use]
    pub fn connectivity(&self) -> &ConnectivityProbe {
        self.repository().connectivity()
    }
}
