//! Local persistence adapter.
//!
//! Every cache, queue and flag read or write in the waitlist layer goes
//! through [`LocalStore`], which encodes values as JSON and never surfaces a
//! failure to its caller: reads fall back to a default, writes log and move
//! on. The string-level [`StorageBackend`] underneath is swappable:
//!
//! - [`MemoryBackend`] - in-process map with an optional byte quota
//! - [`FileBackend`] - one JSON object on disk, rewritten atomically

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors raised by a storage backend.
///
/// These never leave [`LocalStore`]; they exist so backends can report what
/// went wrong to the log.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A value could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The write would exceed the backend's capacity.
    #[error("storage quota exceeded: {requested} bytes requested, {limit} allowed")]
    QuotaExceeded { limit: usize, requested: usize },

    /// A previous writer panicked while holding the lock.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// String key-value store with synchronous access.
pub trait StorageBackend: Send + Sync {
    /// Read the raw value for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store the raw value for `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

// =============================================================================
// LocalStore
// =============================================================================

/// JSON view over a [`StorageBackend`] that never fails.
#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore").finish_non_exhaustive()
    }
}

impl LocalStore {
    #[must_use]
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Store backed by a fresh, unbounded [`MemoryBackend`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Read `key`, or `default` when it is missing or unreadable.
    pub fn get<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get_opt(key).unwrap_or(default)
    }

    /// Read `key`, or `None` when it is missing or unreadable.
    pub fn get_opt<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get_item(key) {
            Ok(raw) => raw?,
            Err(e) => {
                tracing::warn!(key, error = %e, "Failed to read from local storage");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "Discarding unreadable local storage value");
                None
            }
        }
    }

    /// Write `value` under `key`. Failures are logged and ignored.
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let result = serde_json::to_string(value)
            .map_err(StorageError::from)
            .and_then(|raw| self.backend.set_item(key, &raw));

        if let Err(e) = result {
            tracing::warn!(key, error = %e, "Failed to save to local storage");
        }
    }

    /// Delete `key`. Failures are logged and ignored.
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove_item(key) {
            tracing::warn!(key, error = %e, "Failed to remove from local storage");
        }
    }
}

// =============================================================================
// MemoryBackend
// =============================================================================

/// In-process backend.
///
/// With a quota set, writes that would push the total size of keys plus
/// values past the limit fail with [`StorageError::QuotaExceeded`], the same
/// way browser storage behaves when full.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    items: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that refuses writes beyond `quota_bytes` in total.
    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            items: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Total bytes currently held (keys plus values).
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.items
            .lock()
            .map(|items| items.iter().map(|(k, v)| k.len() + v.len()).sum())
            .unwrap_or(0)
    }
}

impl StorageBackend for MemoryBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;

        if let Some(limit) = self.quota_bytes {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let requested = others + key.len() + value.len();
            if requested > limit {
                return Err(StorageError::QuotaExceeded { limit, requested });
            }
        }

        items.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        items.remove(key);
        Ok(())
    }
}

// =============================================================================
// FileBackend
// =============================================================================

/// Backend persisted as a single JSON object on disk.
///
/// The file is read once at [`FileBackend::open`]; every write rewrites it
/// through a temporary sibling and a rename so a crash never leaves a
/// half-written file behind.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileBackend {
    /// Open (or create) the store at `path`.
    ///
    /// A file that exists but cannot be parsed is logged and treated as empty;
    /// it is overwritten by the next write.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the file
    /// exists but cannot be read.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let items = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "Local storage file is corrupt, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = items.len(), "Opened local storage");

        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    /// Location of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let raw = serde_json::to_vec_pretty(items)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        let previous = items.insert(key.to_owned(), value.to_owned());

        if let Err(e) = self.persist(&items) {
            // Keep memory consistent with what is on disk
            match previous {
                Some(old) => items.insert(key.to_owned(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.items.lock().map_err(|_| StorageError::Poisoned)?;
        let Some(previous) = items.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&items) {
            items.insert(key.to_owned(), previous);
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_get_returns_default_for_missing_key() {
        let store = LocalStore::in_memory();
        assert_eq!(store.get("missing", 7_u64), 7);
        assert_eq!(store.get_opt::<u64>("missing"), None);
    }

    #[test]
    fn test_set_then_get() {
        let store = LocalStore::in_memory();
        store.set("count", &42_u64);
        assert_eq!(store.get("count", 0_u64), 42);
    }

    #[test]
    fn test_get_returns_default_for_wrong_type() {
        let store = LocalStore::in_memory();
        store.set("flag", "not a bool");
        assert!(!store.get("flag", false));
    }

    #[test]
    fn test_quota_exceeded_is_swallowed() {
        let backend = Arc::new(MemoryBackend::with_quota(16));
        let store = LocalStore::new(backend.clone());

        store.set("k", &1_u8);
        store.set("big", &"x".repeat(64));

        assert_eq!(store.get("k", 0_u8), 1);
        assert_eq!(store.get_opt::<String>("big"), None);
        assert!(backend.used_bytes() <= 16);
    }

    #[test]
    fn test_quota_allows_overwriting_same_key() {
        let backend = MemoryBackend::with_quota(12);
        backend.set_item("key", "aaaaaaaa").unwrap();
        backend.set_item("key", "bbbbbbbb").unwrap();
        assert_eq!(backend.get_item("key").unwrap().as_deref(), Some("bbbbbbbb"));
    }

    #[test]
    fn test_remove() {
        let store = LocalStore::in_memory();
        store.set("k", &true);
        store.remove("k");
        store.remove("never-set");
        assert_eq!(store.get_opt::<bool>("k"), None);
    }

    #[test]
    fn test_file_backend_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");

        {
            let store = LocalStore::new(Arc::new(FileBackend::open(&path).unwrap()));
            store.set("zynvo_cached_count", &13_000_u64);
            store.set("zynvo_permission_error", &true);
        }

        let store = LocalStore::new(Arc::new(FileBackend::open(&path).unwrap()));
        assert_eq!(store.get("zynvo_cached_count", 0_u64), 13_000);
        assert!(store.get("zynvo_permission_error", false));
    }

    #[test]
    fn test_file_backend_recovers_from_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{not json").unwrap();

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.get_item("anything").unwrap(), None);

        backend.set_item("k", "1").unwrap();
        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.get_item("k").unwrap().as_deref(), Some("1"));
    }
}
