//! Directory-backed partitions
//!
//! Layout under the storage root:
//!
//! ```text
//! caches/<partition>/<sha256(key)>.json   metadata, including the key
//! caches/<partition>/<sha256(key)>.body   raw response body
//! ```
//!
//! The body is written before the metadata, so an entry only becomes
//! visible to `keys()` once it is complete.

use super::{CacheStorage, CacheStore};
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::fetch::Response;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tracing::{debug, warn};

const META_EXT: &str = "json";
const BODY_EXT: &str = "body";

/// Metadata file contents
#[derive(Debug, Serialize, Deserialize)]
struct EntryMeta {
    key: String,
    #[serde(flatten)]
    response: Response,
}

/// A partition stored as a directory of entry files
#[derive(Debug, Clone)]
pub struct DiskStore {
    name: String,
    dir: PathBuf,
}

impl DiskStore {
    fn entry_path(&self, key: &str, ext: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir.join(format!("{}.{}", hex::encode(digest), ext))
    }

    fn err(&self, op: &str, e: impl std::fmt::Display) -> ShellCacheError {
        ShellCacheError::store(&self.name, format!("{}: {}", op, e))
    }

    async fn remove_if_present(&self, path: &Path) -> ShellCacheResult<bool> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(self.err(&format!("removing {}", path.display()), e)),
        }
    }
}

#[async_trait]
impl CacheStore for DiskStore {
    async fn get(&self, key: &str) -> ShellCacheResult<Option<Response>> {
        let meta_path = self.entry_path(key, META_EXT);
        let content = match fs::read_to_string(&meta_path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.err("reading entry metadata", e)),
        };
        let meta: EntryMeta = serde_json::from_str(&content)?;

        let body = match fs::read(self.entry_path(key, BODY_EXT)).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Entry {} in {} has no body, treating as miss", key, self.name);
                return Ok(None);
            }
            Err(e) => return Err(self.err("reading entry body", e)),
        };

        Ok(Some(Response {
            body,
            ..meta.response
        }))
    }

    async fn put(&self, key: &str, response: Response) -> ShellCacheResult<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.err("creating partition directory", e))?;

        fs::write(self.entry_path(key, BODY_EXT), &response.body)
            .await
            .map_err(|e| self.err("writing entry body", e))?;

        let meta = EntryMeta {
            key: key.to_string(),
            response,
        };
        let content = serde_json::to_string(&meta)?;
        fs::write(self.entry_path(key, META_EXT), content)
            .await
            .map_err(|e| self.err("writing entry metadata", e))?;

        debug!("Stored {} in {}", key, self.name);
        Ok(())
    }

    async fn delete(&self, key: &str) -> ShellCacheResult<bool> {
        let existed = self.remove_if_present(&self.entry_path(key, META_EXT)).await?;
        self.remove_if_present(&self.entry_path(key, BODY_EXT)).await?;
        Ok(existed)
    }

    async fn keys(&self) -> ShellCacheResult<Vec<String>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(self.err("listing partition", e)),
        };

        let mut keys = vec![];
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| self.err("listing partition", e))?
        {
            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == META_EXT) {
                continue;
            }
            let content = fs::read_to_string(&path)
                .await
                .map_err(|e| self.err("reading entry metadata", e))?;
            let meta: EntryMeta = serde_json::from_str(&content)?;
            keys.push(meta.key);
        }

        keys.sort();
        Ok(keys)
    }

    async fn clear(&self) -> ShellCacheResult<()> {
        for key in self.keys().await? {
            self.delete(&key).await?;
        }
        Ok(())
    }
}

/// Partitions stored under `<root>/caches`
#[derive(Debug, Clone)]
pub struct DiskStorage {
    root: PathBuf,
}

impl DiskStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Storage root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn partition_dir(&self, name: &str) -> ShellCacheResult<PathBuf> {
        let valid = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !valid {
            return Err(ShellCacheError::store(name, "invalid partition name"));
        }
        Ok(self.root.join("caches").join(name))
    }
}

#[async_trait]
impl CacheStorage for DiskStorage {
    async fn open(&self, name: &str) -> ShellCacheResult<Arc<dyn CacheStore>> {
        let dir = self.partition_dir(name)?;
        fs::create_dir_all(&dir).await.map_err(|e| {
            ShellCacheError::io(format!("creating partition {}", dir.display()), e)
        })?;
        Ok(Arc::new(DiskStore {
            name: name.to_string(),
            dir,
        }))
    }

    async fn delete(&self, name: &str) -> ShellCacheResult<bool> {
        let dir = self.partition_dir(name)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => {
                debug!("Deleted partition {}", name);
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ShellCacheError::io(
                format!("deleting partition {}", dir.display()),
                e,
            )),
        }
    }

    async fn has(&self, name: &str) -> ShellCacheResult<bool> {
        Ok(self.partition_dir(name)?.is_dir())
    }
}
