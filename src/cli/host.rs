//! Builds the worker a command runs against
//!
//! Every invocation reconstructs the worker from configuration and the
//! persisted record, so separate processes share one lifecycle. Until the
//! newest version reaches `reconciled`, the last reconciled version is rebuilt
//! from the manifest snapshot and keeps serving requests.

use crate::config::Config;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::fetch::HttpFetcher;
use crate::journal::Journal;
use crate::lifecycle::WorkerState;
use crate::manifest::ResourceManifest;
use crate::origin::Origin;
use crate::store::{CacheStorage, DiskStorage};
use crate::worker::{ServiceWorker, WorkerContext, WorkerRecord};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A worker bound to on-disk storage
pub struct WorkerHost {
    /// Newest version, driven by install and activate
    pub worker: ServiceWorker,
    /// Last reconciled version, present while `worker` does not control clients
    previous: Option<ServiceWorker>,
    pub journal: Journal,
    pub fetcher: Arc<HttpFetcher>,
    pub storage: Arc<DiskStorage>,
    root: PathBuf,
}

impl WorkerHost {
    /// Load the manifest and resume or register the worker
    pub async fn open(config: &Config) -> ShellCacheResult<Self> {
        let manifest_path = config
            .worker
            .manifest
            .as_ref()
            .ok_or(ShellCacheError::ManifestNotConfigured)?;
        let manifest = ResourceManifest::from_file(manifest_path).await?;
        let origin = Origin::parse(&config.worker.origin)?;

        let root = config.storage.root.clone();
        let storage = Arc::new(DiskStorage::new(&root));
        let fetcher = Arc::new(HttpFetcher::new(&config.fetch));
        let ctx = WorkerContext::new(
            origin.clone(),
            manifest,
            config.worker.shell.iter().cloned(),
            storage.clone(),
            fetcher.clone(),
        )?
        .with_partitions(config.storage.partitions())
        .with_prefetch_concurrency(config.fetch.prefetch_concurrency);

        let version = ctx.version();
        let worker = match WorkerRecord::load(&root).await? {
            Some(record) if record.is_version(&version) && is_resumable(record.state) => {
                debug!("Resuming worker {} ({})", version, record.state);
                ServiceWorker::resume(ctx, record.state, record.skip_waiting)
            }
            Some(record) if !record.is_version(&version) => {
                info!(
                    "Manifest changed ({} -> {}), registering new worker",
                    record.version, version
                );
                ServiceWorker::new(ctx)
            }
            _ => ServiceWorker::new(ctx),
        };

        let previous = if worker.state().await.controls_clients() {
            None
        } else {
            open_previous(config, origin, storage.clone(), fetcher.clone(), &root, &worker).await?
        };

        Ok(Self {
            worker,
            previous,
            journal: Journal::new(&root, config.general.journal),
            fetcher,
            storage,
            root,
        })
    }

    /// Storage root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The version that handles requests and offline downloads
    ///
    /// The newest version once it is reconciled, else the previous one if
    /// any. Without either, the newest version passes requests through.
    pub async fn controller(&self) -> &ServiceWorker {
        if !self.worker.state().await.controls_clients() {
            if let Some(previous) = &self.previous {
                return previous;
            }
        }
        &self.worker
    }

    /// Persist the worker's lifecycle for the next invocation
    pub async fn persist(&self) -> ShellCacheResult<()> {
        let mut record = self.worker.record().await;
        record.save(&self.root).await?;
        match record.state {
            WorkerState::Reconciled => record.save_active(&self.root).await,
            // Every partition was deleted, nothing is left to serve
            WorkerState::Reset => WorkerRecord::clear_active(&self.root).await,
            _ => Ok(()),
        }
    }
}

/// Rebuild the last reconciled version from the manifest snapshot
///
/// Returns `None` when no version was reconciled, or when the snapshot no
/// longer belongs to the recorded version.
async fn open_previous(
    config: &Config,
    origin: Origin,
    storage: Arc<DiskStorage>,
    fetcher: Arc<HttpFetcher>,
    root: &Path,
    newest: &ServiceWorker,
) -> ShellCacheResult<Option<ServiceWorker>> {
    let Some(active) = WorkerRecord::load_active(root).await? else {
        return Ok(None);
    };
    // Opening a partition creates it, so check first
    if !storage.has(&config.storage.snapshot).await? {
        return Ok(None);
    }
    let manifest = match newest.previous_manifest().await {
        Ok(Some(manifest)) => manifest,
        Ok(None) => return Ok(None),
        Err(e) => {
            warn!("Cannot rebuild worker {}: {}", active.version, e);
            return Ok(None);
        }
    };
    if active.state != WorkerState::Reconciled || !active.is_version(&manifest.version()) {
        warn!(
            "Active record {} does not match snapshot {}",
            active.version,
            manifest.version()
        );
        return Ok(None);
    }

    // The shell only matters for install; keep the keys this version knows
    let shell: Vec<String> = config
        .worker
        .shell
        .iter()
        .filter(|key| manifest.contains(key))
        .cloned()
        .collect();
    let ctx = WorkerContext::new(origin, manifest, shell, storage, fetcher)?
        .with_partitions(config.storage.partitions())
        .with_prefetch_concurrency(config.fetch.prefetch_concurrency);

    debug!("Worker {} keeps controlling clients", active.version);
    Ok(Some(ServiceWorker::resume(
        ctx,
        WorkerState::Reconciled,
        active.skip_waiting,
    )))
}

/// States a new process can continue from
///
/// A worker left mid-install, mid-activation or redundant is registered
/// again from scratch.
fn is_resumable(state: WorkerState) -> bool {
    matches!(
        state,
        WorkerState::Staged | WorkerState::Reconciled | WorkerState::Reset
    )
}
