//! Persisted worker lifecycle
//!
//! Each CLI invocation builds a fresh worker; the record lets `install`,
//! `activate` and `fetch` run as separate processes against one lifecycle.
//!
//! Two records are kept. `worker.json` follows the newest version through
//! install and activation. `active.json` names the last version that reached
//! `reconciled`, which keeps controlling clients while a newer version is
//! staged or after its install failed.

use crate::error::{ShellCacheError, ShellCacheResult};
use crate::lifecycle::WorkerState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

const RECORD_FILE: &str = "worker.json";
const ACTIVE_FILE: &str = "active.json";

/// Lifecycle of the most recent worker version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    /// Manifest-derived version id
    pub version: String,

    pub state: WorkerState,

    /// Whether skip-waiting was requested
    pub skip_waiting: bool,

    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl WorkerRecord {
    pub fn new(version: String, state: WorkerState, skip_waiting: bool) -> Self {
        Self {
            version,
            state,
            skip_waiting,
            updated_at: Utc::now(),
        }
    }

    /// Record file path under a storage root
    pub fn file_path(root: &Path) -> PathBuf {
        root.join(RECORD_FILE)
    }

    /// Active record file path under a storage root
    pub fn active_path(root: &Path) -> PathBuf {
        root.join(ACTIVE_FILE)
    }

    /// Load the newest worker's record, if one was saved
    pub async fn load(root: &Path) -> ShellCacheResult<Option<Self>> {
        Self::load_from(&Self::file_path(root)).await
    }

    /// Load the record of the version controlling clients
    pub async fn load_active(root: &Path) -> ShellCacheResult<Option<Self>> {
        Self::load_from(&Self::active_path(root)).await
    }

    /// Save the record, stamping `updated_at`
    pub async fn save(&mut self, root: &Path) -> ShellCacheResult<()> {
        self.save_to(root, &Self::file_path(root)).await
    }

    /// Save as the version controlling clients
    pub async fn save_active(&mut self, root: &Path) -> ShellCacheResult<()> {
        self.save_to(root, &Self::active_path(root)).await
    }

    /// Forget the active version (its partitions are gone)
    pub async fn clear_active(root: &Path) -> ShellCacheResult<()> {
        let path = Self::active_path(root);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ShellCacheError::io(
                format!("removing worker record {}", path.display()),
                e,
            )),
        }
    }

    async fn load_from(path: &Path) -> ShellCacheResult<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            ShellCacheError::io(format!("reading worker record {}", path.display()), e)
        })?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn save_to(&mut self, root: &Path, path: &Path) -> ShellCacheResult<()> {
        self.updated_at = Utc::now();
        fs::create_dir_all(root)
            .await
            .map_err(|e| ShellCacheError::io("creating storage directory", e))?;

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await.map_err(|e| {
            ShellCacheError::io(format!("writing worker record {}", path.display()), e)
        })
    }

    /// Whether this record belongs to the given version
    pub fn is_version(&self, version: &str) -> bool {
        self.version == version
    }
}
