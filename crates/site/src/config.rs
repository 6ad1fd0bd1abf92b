//! Site configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FIRESTORE_PROJECT_ID` - Google Cloud project holding the waitlist
//!
//! ## Optional
//! - `FIRESTORE_API_KEY` - Web API key appended to every request
//! - `FIRESTORE_DATABASE` - Database id (default: `(default)`)
//! - `FIRESTORE_BASE_URL` - REST endpoint, e.g. an emulator
//!   (default: <https://firestore.googleapis.com/v1>)
//! - `FIRESTORE_TIMEOUT_SECS` - Per-request timeout (default: 10)
//! - `ZYNVO_HOST` - Bind address (default: 127.0.0.1)
//! - `ZYNVO_PORT` - Listen port (default: 3000)
//! - `ZYNVO_STORAGE_PATH` - Local persistence file (default: `.zynvo/local-storage.json`)
//! - `ZYNVO_SIGNUP_SOURCE` - `source` tag for new signups (default: website)
//! - `ZYNVO_INITIAL_LOAD_DELAY_MS` - Delay before the first count load (default: 1000)
//! - `ZYNVO_RECONNECT_SYNC_DELAY_MS` - Delay before syncing after reconnect (default: 1000)
//! - `ZYNVO_STARTUP_SYNC_DELAY_MS` - Delay before the startup sync (default: 2000)
//! - `ZYNVO_CONNECTIVITY_INTERVAL_SECS` - Reachability poll interval (default: 15)
//! - `ZYNVO_PERMISSION_RETRY_SECS` - Leave degraded mode after this long (default: never)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::TimeDelta;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::services::waitlist::repository::DEFAULT_SOURCE;
use crate::services::waitlist::{RepositoryOptions, ViewModelConfig};

const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";
const DEFAULT_DATABASE: &str = "(default)";
const DEFAULT_STORAGE_PATH: &str = ".zynvo/local-storage.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Site configuration.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// File backing the local key/value store
    pub storage_path: PathBuf,
    pub firestore: FirestoreConfig,
    pub waitlist: WaitlistConfig,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Firestore REST configuration.
///
/// Implements `Debug` manually to redact the API key.
#[derive(Clone)]
pub struct FirestoreConfig {
    pub project_id: String,
    pub database: String,
    pub base_url: Url,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

impl std::fmt::Debug for FirestoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirestoreConfig")
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Waitlist behaviour tunables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitlistConfig {
    pub signup_source: String,
    pub initial_load_delay: Duration,
    pub reconnect_sync_delay: Duration,
    pub startup_sync_delay: Duration,
    pub connectivity_interval: Duration,
    pub permission_retry_after: Option<Duration>,
}

impl Default for WaitlistConfig {
    fn default() -> Self {
        let view_model = ViewModelConfig::default();
        Self {
            signup_source: DEFAULT_SOURCE.to_string(),
            initial_load_delay: view_model.initial_load_delay,
            reconnect_sync_delay: view_model.reconnect_sync_delay,
            startup_sync_delay: view_model.startup_sync_delay,
            connectivity_interval: Duration::from_secs(15),
            permission_retry_after: None,
        }
    }
}

impl SiteConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        Ok(Self {
            host: env.parse_or("ZYNVO_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env.parse_or("ZYNVO_PORT", 3000)?,
            storage_path: env
                .optional("ZYNVO_STORAGE_PATH")
                .map_or_else(|| PathBuf::from(DEFAULT_STORAGE_PATH), PathBuf::from),
            firestore: FirestoreConfig::from_env(&env)?,
            waitlist: WaitlistConfig::from_env(&env)?,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl FirestoreConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let base_url = env.optional("FIRESTORE_BASE_URL");
        let base_url = base_url.as_deref().unwrap_or(DEFAULT_FIRESTORE_URL);

        Ok(Self {
            project_id: env.required("FIRESTORE_PROJECT_ID")?,
            database: env
                .optional("FIRESTORE_DATABASE")
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string()),
            base_url: Url::parse(base_url).map_err(|e| {
                ConfigError::InvalidEnvVar("FIRESTORE_BASE_URL".to_string(), e.to_string())
            })?,
            api_key: env.optional("FIRESTORE_API_KEY").map(SecretString::from),
            timeout: Duration::from_secs(env.parse_or("FIRESTORE_TIMEOUT_SECS", 10)?),
        })
    }
}

impl WaitlistConfig {
    fn from_env(env: &Env<'_>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let millis = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            let default = u64::try_from(default.as_millis()).unwrap_or(u64::MAX);
            Ok(Duration::from_millis(env.parse_or(key, default)?))
        };

        Ok(Self {
            signup_source: env
                .optional("ZYNVO_SIGNUP_SOURCE")
                .unwrap_or(defaults.signup_source),
            initial_load_delay: millis("ZYNVO_INITIAL_LOAD_DELAY_MS", defaults.initial_load_delay)?,
            reconnect_sync_delay: millis(
                "ZYNVO_RECONNECT_SYNC_DELAY_MS",
                defaults.reconnect_sync_delay,
            )?,
            startup_sync_delay: millis("ZYNVO_STARTUP_SYNC_DELAY_MS", defaults.startup_sync_delay)?,
            connectivity_interval: Duration::from_secs(
                env.parse_or("ZYNVO_CONNECTIVITY_INTERVAL_SECS", 15)?,
            ),
            permission_retry_after: env
                .parse_opt::<u64>("ZYNVO_PERMISSION_RETRY_SECS")?
                .map(Duration::from_secs),
        })
    }

    #[must_use]
    pub const fn view_model_config(&self) -> ViewModelConfig {
        ViewModelConfig {
            initial_load_delay: self.initial_load_delay,
            reconnect_sync_delay: self.reconnect_sync_delay,
            startup_sync_delay: self.startup_sync_delay,
        }
    }

    #[must_use]
    pub fn repository_options(&self) -> RepositoryOptions {
        RepositoryOptions {
            source: self.signup_source.clone(),
            permission_retry_after: self
                .permission_retry_after
                .and_then(|window| TimeDelta::from_std(window).ok()),
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup with the usual required/optional/default helpers.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get an optional variable. Blank counts as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Parse an optional variable.
    fn parse_opt<T>(&self, key: &str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key)
            .map(|raw| {
                raw.trim()
                    .parse::<T>()
                    .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
            })
            .transpose()
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse_opt(key)?.unwrap_or(default))
    }
}
