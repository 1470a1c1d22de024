//! Error types for shellcache
//!
//! All modules use `ShellCacheResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

use crate::lifecycle::{LifecycleEvent, WorkerState};

/// Result type alias for shellcache operations
pub type ShellCacheResult<T> = Result<T, ShellCacheError>;

/// All errors that can occur in shellcache
#[derive(Error, Debug)]
pub enum ShellCacheError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid origin {origin}: {reason}")]
    OriginInvalid { origin: String, reason: String },

    #[error("No resource manifest configured")]
    ManifestNotConfigured,

    // Manifest errors
    #[error("Invalid resource manifest: {0}")]
    ManifestInvalid(String),

    #[error("Invalid fingerprint for {key}: {fingerprint}")]
    FingerprintInvalid { key: String, fingerprint: String },

    #[error("Shell resource not present in manifest: {0}")]
    ShellKeyMissing(String),

    // Storage errors
    #[error("Cache partition {partition} failed: {reason}")]
    Store { partition: String, reason: String },

    #[error("Manifest snapshot is corrupt: {0}")]
    SnapshotCorrupt(String),

    // Fetch errors
    #[error("Network error fetching {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Fetching {url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Offline download incomplete: {} resource(s) failed", failed.len())]
    PrefetchIncomplete { failed: Vec<String> },

    // Lifecycle errors
    #[error("Worker cannot handle {event:?} while {state}")]
    InvalidTransition {
        state: WorkerState,
        event: LifecycleEvent,
    },

    #[error("Install failed for shell resource {key}: {reason}")]
    InstallFailed { key: String, reason: String },

    #[error("Activation failed and every cache partition was reset: {0}")]
    ActivationReset(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ShellCacheError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a storage error for a named partition
    pub fn store(partition: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Store {
            partition: partition.into(),
            reason: reason.into(),
        }
    }

    /// Create a network error for a URL
    pub fn network(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::PrefetchIncomplete { .. } => true,
            Self::HttpStatus { status, .. } => *status >= 500,
            Self::InstallFailed { .. } => true,
            _ => false,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ManifestNotConfigured => {
                Some("Set worker.manifest in config, or run: shellcache manifest <build-dir>")
            }
            Self::ShellKeyMissing(_) => Some("Every worker.shell entry must be a manifest key"),
            Self::InvalidTransition { .. } => Some("Run: shellcache status"),
            Self::ActivationReset(_) => Some("Run: shellcache activate (retries as a first install)"),
            Self::PrefetchIncomplete { .. } => Some("Run: shellcache message downloadOffline"),
            Self::OriginInvalid { .. } => Some("Use a bare origin such as https://app.example.com"),
            _ => None,
        }
    }
}
