//! Reconciliation of the content partition against the manifest

use super::WorkerContext;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::fetch::Response;
use crate::manifest::ResourceManifest;
use crate::store::{CacheStore, SNAPSHOT_KEY};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of an activation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum Activation {
    /// Content now matches the manifest; this version controls clients
    Reconciled(ReconcileSummary),
    /// Something failed and every partition was deleted
    Reset { reason: String },
}

impl Activation {
    pub fn is_reconciled(&self) -> bool {
        matches!(self, Activation::Reconciled(_))
    }
}

/// What a successful activation did to content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// No usable snapshot existed, so content was wiped
    pub first_install: bool,
    /// Logical keys kept untouched
    pub retained: Vec<String>,
    /// Stored URLs removed from content
    pub evicted: Vec<String>,
    /// Logical keys copied from staging
    pub restored: Vec<String>,
    pub clients_claimed: bool,
}

pub(super) async fn run(ctx: &WorkerContext) -> Activation {
    match reconcile(ctx).await {
        Ok(summary) => {
            info!(
                "Activated {}: {} retained, {} evicted, {} from staging{}",
                ctx.version(),
                summary.retained.len(),
                summary.evicted.len(),
                summary.restored.len(),
                if summary.first_install { " (first install)" } else { "" }
            );
            Activation::Reconciled(summary)
        }
        Err(e) => {
            error!("Activation failed, resetting all partitions: {}", e);
            reset(ctx).await;
            Activation::Reset {
                reason: e.to_string(),
            }
        }
    }
}

async fn reconcile(ctx: &WorkerContext) -> ShellCacheResult<ReconcileSummary> {
    let names = &ctx.partitions;
    let mut content = ctx.storage.open(&names.content).await?;
    let staging = ctx.storage.open(&names.staging).await?;
    let snapshot = ctx.storage.open(&names.snapshot).await?;

    let mut summary = ReconcileSummary::default();
    match read_snapshot(snapshot.as_ref()).await? {
        None => {
            summary.first_install = true;
            summary.evicted = content.keys().await?;
            ctx.storage.delete(&names.content).await?;
            content = ctx.storage.open(&names.content).await?;
        }
        Some(previous) => {
            for url in content.keys().await? {
                let keep = ctx
                    .origin
                    .relative_key(&url)
                    .filter(|key| is_unchanged(&ctx.manifest, &previous, key));
                match keep {
                    Some(key) => summary.retained.push(key),
                    None => {
                        debug!("Evicting {}", url);
                        content.delete(&url).await?;
                        summary.evicted.push(url);
                    }
                }
            }
        }
    }

    summary.restored = copy_staging(ctx, staging.as_ref(), content.as_ref()).await?;
    ctx.storage.delete(&names.staging).await?;
    write_snapshot(snapshot.as_ref(), &ctx.manifest).await?;
    summary.clients_claimed = true;
    Ok(summary)
}

/// An entry survives only when both manifests carry the same fingerprint
fn is_unchanged(current: &ResourceManifest, previous: &ResourceManifest, key: &str) -> bool {
    match (current.fingerprint(key), previous.fingerprint(key)) {
        (Some(now), Some(before)) => now == before,
        _ => false,
    }
}

async fn copy_staging(
    ctx: &WorkerContext,
    staging: &dyn CacheStore,
    content: &dyn CacheStore,
) -> ShellCacheResult<Vec<String>> {
    let mut restored = vec![];
    for url in staging.keys().await? {
        let Some(response) = staging.get(&url).await? else {
            continue;
        };
        content.put(&url, response).await?;
        restored.push(ctx.origin.relative_key(&url).unwrap_or(url));
    }
    Ok(restored)
}

/// Previous manifest, or `None` when no snapshot exists
async fn read_snapshot(
    snapshot: &dyn CacheStore,
) -> ShellCacheResult<Option<ResourceManifest>> {
    let Some(entry) = snapshot.get(SNAPSHOT_KEY).await? else {
        return Ok(None);
    };
    let json = String::from_utf8(entry.body)
        .map_err(|e| ShellCacheError::SnapshotCorrupt(e.to_string()))?;
    let manifest = ResourceManifest::parse(&json)
        .map_err(|e| ShellCacheError::SnapshotCorrupt(e.to_string()))?;
    Ok(Some(manifest))
}

async fn write_snapshot(
    snapshot: &dyn CacheStore,
    manifest: &ResourceManifest,
) -> ShellCacheResult<()> {
    let mut entry = Response::ok(SNAPSHOT_KEY, manifest.to_json()?);
    entry.content_type = Some("application/json".to_string());
    snapshot.put(SNAPSHOT_KEY, entry).await
}

async fn reset(ctx: &WorkerContext) {
    for name in ctx.partitions.all() {
        if let Err(e) = ctx.storage.delete(name).await {
            warn!("Failed to delete partition {} during reset: {}", name, e);
        }
    }
}

/// Open the snapshot partition of a context and read it
pub(super) async fn previous_manifest(
    ctx: &WorkerContext,
) -> ShellCacheResult<Option<ResourceManifest>> {
    let snapshot: Arc<dyn CacheStore> = ctx.storage.open(&ctx.partitions.snapshot).await?;
    read_snapshot(snapshot.as_ref()).await
}
