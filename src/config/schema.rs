//! Configuration schema for shellcache
//!
//! Configuration is stored at `~/.config/shellcache/config.toml`

use crate::store::PartitionNames;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Shell resources fetched at install time unless configured otherwise
pub const DEFAULT_SHELL: &[&str] = &[
    "main.dart.js",
    "index.html",
    "flutter_bootstrap.js",
    "assets/AssetManifest.bin.json",
    "assets/FontManifest.json",
];

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Worker settings
    pub worker: WorkerConfig,

    /// Cache storage settings
    pub storage: StorageConfig,

    /// Network settings
    pub fetch: FetchConfig,
}

/// General application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,

    /// Append lifecycle events to the journal
    pub journal: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
            journal: true,
        }
    }
}

/// Worker settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Origin the application is served from
    pub origin: String,

    /// Path to the resource manifest JSON
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,

    /// Shell resource keys fetched at install time
    pub shell: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:8080".to_string(),
            manifest: None,
            shell: DEFAULT_SHELL.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Cache storage settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding partitions, the journal and the worker record
    pub root: PathBuf,

    /// Staging partition name
    pub staging: String,

    /// Content partition name
    pub content: String,

    /// Manifest snapshot partition name
    pub snapshot: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let names = PartitionNames::default();
        Self {
            root: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("shellcache"),
            staging: names.staging,
            content: names.content,
            snapshot: names.snapshot,
        }
    }
}

impl StorageConfig {
    pub fn partitions(&self) -> PartitionNames {
        PartitionNames {
            staging: self.staging.clone(),
            content: self.content.clone(),
            snapshot: self.snapshot.clone(),
        }
    }
}

/// Network settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Per-request timeout; unset means no timeout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    /// Concurrent downloads during an offline download
    pub prefetch_concurrency: usize,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: None,
            prefetch_concurrency: 8,
            user_agent: format!("shellcache/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
