//! Named cache partitions
//!
//! The worker keeps three partitions:
//!
//! | Partition | Lifetime | Contents |
//! |-----------|----------|----------|
//! | Staging | install → activate | Freshly fetched shell responses |
//! | Content | durable | Every resource fetched so far |
//! | Snapshot | durable | One entry: the manifest of the last activation |
//!
//! Storage is injected through [`CacheStorage`] so the lifecycle can run
//! against memory in tests and against a directory tree from the CLI.

pub mod disk;
pub mod memory;

pub use disk::DiskStorage;
pub use memory::{MemoryStorage, MemoryStore};

use crate::error::ShellCacheResult;
use crate::fetch::Response;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Key of the single entry held by the snapshot partition
pub const SNAPSHOT_KEY: &str = "manifest";

/// One named partition
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Look up an entry
    async fn get(&self, key: &str) -> ShellCacheResult<Option<Response>>;

    /// Insert or overwrite an entry
    async fn put(&self, key: &str, response: Response) -> ShellCacheResult<()>;

    /// Remove an entry, returning whether it existed
    async fn delete(&self, key: &str) -> ShellCacheResult<bool>;

    /// All stored keys
    async fn keys(&self) -> ShellCacheResult<Vec<String>>;

    /// Remove every entry
    async fn clear(&self) -> ShellCacheResult<()>;
}

/// The set of partitions available to a worker
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a partition, creating it if needed
    async fn open(&self, name: &str) -> ShellCacheResult<Arc<dyn CacheStore>>;

    /// Delete a partition with all its entries, returning whether it existed
    async fn delete(&self, name: &str) -> ShellCacheResult<bool>;

    /// Whether a partition exists
    async fn has(&self, name: &str) -> ShellCacheResult<bool>;
}

/// Names of the three partitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionNames {
    pub staging: String,
    pub content: String,
    pub snapshot: String,
}

impl Default for PartitionNames {
    fn default() -> Self {
        Self {
            staging: "flutter-temp-cache".to_string(),
            content: "flutter-app-cache".to_string(),
            snapshot: "flutter-app-manifest".to_string(),
        }
    }
}

impl PartitionNames {
    /// All names, content first
    pub fn all(&self) -> [&str; 3] {
        [&self.content, &self.staging, &self.snapshot]
    }
}
