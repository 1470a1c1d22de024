//! In-memory partitions
//!
//! Used by tests and by embedders that do not need persistence. A deleted
//! partition is detached: handles opened before the delete keep working on
//! the orphaned data, and the next `open` starts empty.

use super::{CacheStorage, CacheStore};
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::fetch::Response;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

/// One in-memory partition
#[derive(Debug, Default)]
pub struct MemoryStore {
    name: String,
    entries: RwLock<BTreeMap<String, Response>>,
    failing_writes: AtomicUsize,
    failing_reads: AtomicUsize,
}

impl MemoryStore {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Make the next `count` writes (put, delete, clear) fail
    pub fn fail_next_writes(&self, count: usize) {
        self.failing_writes.store(count, Ordering::SeqCst);
    }

    /// Make the next `count` reads (get, keys) fail
    pub fn fail_next_reads(&self, count: usize) {
        self.failing_reads.store(count, Ordering::SeqCst);
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn injected(&self, counter: &AtomicUsize, op: &str) -> ShellCacheResult<()> {
        let tripped = counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if tripped {
            return Err(ShellCacheError::store(&self.name, format!("injected {} failure", op)));
        }
        Ok(())
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Response>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Response>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> ShellCacheResult<Option<Response>> {
        self.injected(&self.failing_reads, "read")?;
        Ok(self.read_entries().get(key).cloned())
    }

    async fn put(&self, key: &str, response: Response) -> ShellCacheResult<()> {
        self.injected(&self.failing_writes, "write")?;
        self.write_entries().insert(key.to_string(), response);
        Ok(())
    }

    async fn delete(&self, key: &str) -> ShellCacheResult<bool> {
        self.injected(&self.failing_writes, "write")?;
        Ok(self.write_entries().remove(key).is_some())
    }

    async fn keys(&self) -> ShellCacheResult<Vec<String>> {
        self.injected(&self.failing_reads, "read")?;
        Ok(self.read_entries().keys().cloned().collect())
    }

    async fn clear(&self) -> ShellCacheResult<()> {
        self.injected(&self.failing_writes, "write")?;
        self.write_entries().clear();
        Ok(())
    }
}

/// In-memory set of partitions
#[derive(Debug, Default)]
pub struct MemoryStorage {
    partitions: Mutex<HashMap<String, Arc<MemoryStore>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete handle to a partition, creating it if needed
    ///
    /// Tests use this to seed entries and inject failures.
    pub fn partition(&self, name: &str) -> Arc<MemoryStore> {
        let mut partitions = self.partitions.lock().unwrap_or_else(|e| e.into_inner());
        partitions
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new(name)))
            .clone()
    }

    /// Names of existing partitions, sorted
    pub fn names(&self) -> Vec<String> {
        let partitions = self.partitions.lock().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = partitions.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl CacheStorage for MemoryStorage {
    async fn open(&self, name: &str) -> ShellCacheResult<Arc<dyn CacheStore>> {
        Ok(self.partition(name))
    }

    async fn delete(&self, name: &str) -> ShellCacheResult<bool> {
        let mut partitions = self.partitions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(partitions.remove(name).is_some())
    }

    async fn has(&self, name: &str) -> ShellCacheResult<bool> {
        let partitions = self.partitions.lock().unwrap_or_else(|e| e.into_inner());
        Ok(partitions.contains_key(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete() {
        let storage = MemoryStorage::new();
        let store = storage.open("content").await.unwrap();

        store
            .put("https://app.test/a.js", Response::ok("https://app.test/a.js", "a"))
            .await
            .unwrap();
        let hit = store.get("https://app.test/a.js").await.unwrap().unwrap();
        assert_eq!(hit.body, b"a");

        assert!(store.delete("https://app.test/a.js").await.unwrap());
        assert!(!store.delete("https://app.test/a.js").await.unwrap());
        assert!(store.get("https://app.test/a.js").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn keys_and_clear() {
        let storage = MemoryStorage::new();
        let store = storage.open("content").await.unwrap();
        store.put("b", Response::ok("b", "")).await.unwrap();
        store.put("a", Response::ok("a", "")).await.unwrap();

        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);
        store.clear().await.unwrap();
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_detaches_partition() {
        let storage = MemoryStorage::new();
        let old = storage.open("content").await.unwrap();
        old.put("a", Response::ok("a", "1")).await.unwrap();

        assert!(storage.delete("content").await.unwrap());
        assert!(!storage.has("content").await.unwrap());

        let fresh = storage.open("content").await.unwrap();
        assert!(fresh.keys().await.unwrap().is_empty());
        assert!(old.get("a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let storage = MemoryStorage::new();
        let store = storage.partition("content");
        store.fail_next_writes(1);

        let err = store.put("a", Response::ok("a", "")).await.unwrap_err();
        assert!(err.to_string().contains("content"));
        store.put("a", Response::ok("a", "")).await.unwrap();
        assert_eq!(store.len(), 1);

        store.fail_next_reads(1);
        assert!(store.keys().await.is_err());
        assert_eq!(store.keys().await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn names_are_sorted() {
        let storage = MemoryStorage::new();
        storage.open("zeta").await.unwrap();
        storage.open("alpha").await.unwrap();
        assert_eq!(storage.names(), vec!["alpha", "zeta"]);
    }
}
