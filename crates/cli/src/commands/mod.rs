//! CLI command implementations.
//!
//! Commands write their output to the writer they are given so they can be
//! exercised without a terminal.

pub mod export;
pub mod waitlist;

use thiserror::Error;
use zynvo_site::config::{ConfigError, SiteConfig};
use zynvo_site::services::waitlist::{ExportError, RemoteStore};
use zynvo_site::state::{AppState, StartupError};

/// Errors that can occur while running a command.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Startup error: {0}")]
    Startup(#[from] StartupError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The signup was not accepted.
    #[error("{0}")]
    SignupFailed(String),
}

/// Build the waitlist stack from the environment.
///
/// Connectivity is checked once up front unless `offline` forces it off.
pub async fn open_state(offline: bool) -> Result<AppState, CommandError> {
    let config = SiteConfig::from_env()?;
    let state = AppState::from_config(config)?;

    let online = !offline && state.remote().is_reachable().await;
    state.connectivity().set_online(online);
    tracing::debug!(online, "Connectivity resolved");

    Ok(state)
}
