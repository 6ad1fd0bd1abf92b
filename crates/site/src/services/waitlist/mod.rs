//! Waitlist data-access layer.
//!
//! - [`storage`] - key/value persistence that never fails its callers
//! - [`connectivity`] - online/offline state and transitions
//! - [`estimator`] - plausible count when the real one is unavailable
//! - [`remote`] - the hosted store seam plus an in-process implementation
//! - [`repository`] - signup, count, sync and listing
//! - [`view_model`] - reactive presentation state
//! - [`admin`] - dashboard aggregates and CSV export

pub mod admin;
pub mod connectivity;
pub mod estimator;
pub mod remote;
pub mod repository;
pub mod storage;
pub mod view_model;

pub use admin::{AdminDashboard, ExportError};
pub use connectivity::{ConnectivityEvent, ConnectivityProbe, spawn_monitor};
pub use estimator::CountEstimator;
pub use remote::{Failure, MemoryStore, Operation, RemoteError, RemoteStore};
pub use repository::{RepositoryOptions, SyncReport, SyncStatus, WaitlistRepository};
pub use storage::{FileBackend, LocalStore, MemoryBackend, StorageBackend, StorageError};
pub use view_model::{Advisory, MountHandle, ViewModelConfig, WaitlistState, WaitlistViewModel};
