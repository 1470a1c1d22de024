//! Lifecycle journal
//!
//! Appends JSON lines to `<storage root>/journal.log`, one per install,
//! activation and offline download.

use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

const JOURNAL_FILE: &str = "journal.log";

/// Append-only event log
pub struct Journal {
    enabled: bool,
    path: PathBuf,
}

impl Journal {
    /// Journal stored under a storage root
    pub fn new(root: &Path, enabled: bool) -> Self {
        Self {
            enabled,
            path: root.join(JOURNAL_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an event
    ///
    /// Write failures are logged and dropped.
    pub async fn record(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "event": event,
            "data": data,
        });
        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize journal event {}: {}", event, e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write journal {}: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn appends_events() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::new(dir.path(), true);

        journal
            .record("worker.installed", &serde_json::json!({"version": "abc"}))
            .await;
        journal.record("worker.activated", &serde_json::json!({})).await;

        let content = tokio::fs::read_to_string(journal.path()).await.unwrap();
        let lines: Vec<serde_json::Value> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "worker.installed");
        assert_eq!(lines[0]["data"]["version"], "abc");
        assert!(lines[1]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn disabled_journal_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::new(dir.path(), false);
        journal.record("worker.reset", &serde_json::json!({})).await;
        assert!(!journal.path().exists());
    }

    #[tokio::test]
    async fn unwritable_path_is_dropped() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        // Parent is a regular file, so create_dir_all fails
        let journal = Journal::new(&blocker, true);
        journal.record("worker.reset", &serde_json::json!({})).await;
        assert!(!journal.path().exists());
    }
}
