//! The offline cache worker
//!
//! Ties the manifest, the three partitions and the network together behind
//! the four entry points a host drives:
//!
//! - [`ServiceWorker::install`] stages the shell (once per version)
//! - [`ServiceWorker::activate`] reconciles content against the manifest
//! - [`ServiceWorker::handle_fetch`] routes one request
//! - [`ServiceWorker::handle_message`] handles `skipWaiting` / `downloadOffline`
//!
//! Lifecycle state sits behind an async read/write lock. Install and
//! activate hold the write side until they finish; every request takes the
//! read side first, so nothing is served from a half-reconciled cache.

mod activate;
mod install;
mod intercept;
mod message;
mod prefetch;
pub mod record;

pub use activate::{Activation, ReconcileSummary};
pub use install::InstallReport;
pub use intercept::{route, FetchOutcome, ResponseSource, Route};
pub use message::{Message, MessageOutcome};
pub use prefetch::{PrefetchFailure, PrefetchReport};
pub use record::WorkerRecord;

use crate::error::ShellCacheResult;
use crate::fetch::{Fetcher, Request, Response};
use crate::lifecycle::{LifecycleEvent, WorkerState};
use crate::manifest::{ResourceManifest, ShellSet};
use crate::origin::Origin;
use crate::store::{CacheStorage, CacheStore, PartitionNames};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Default number of concurrent offline downloads
pub const DEFAULT_PREFETCH_CONCURRENCY: usize = 8;

/// Everything a worker version is built from
pub struct WorkerContext {
    pub origin: Origin,
    pub manifest: ResourceManifest,
    pub shell: ShellSet,
    pub partitions: PartitionNames,
    pub storage: Arc<dyn CacheStorage>,
    pub fetcher: Arc<dyn Fetcher>,
    pub prefetch_concurrency: usize,
}

impl WorkerContext {
    /// Build a context, checking the shell against the manifest
    pub fn new<I, S>(
        origin: Origin,
        manifest: ResourceManifest,
        shell: I,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> ShellCacheResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let shell = ShellSet::new(shell, &manifest)?;
        Ok(Self {
            origin,
            manifest,
            shell,
            partitions: PartitionNames::default(),
            storage,
            fetcher,
            prefetch_concurrency: DEFAULT_PREFETCH_CONCURRENCY,
        })
    }

    /// Use custom partition names
    pub fn with_partitions(mut self, partitions: PartitionNames) -> Self {
        self.partitions = partitions;
        self
    }

    /// Bound concurrent offline downloads (at least one)
    pub fn with_prefetch_concurrency(mut self, concurrency: usize) -> Self {
        self.prefetch_concurrency = concurrency.max(1);
        self
    }

    /// Version id of this worker (derived from the manifest)
    pub fn version(&self) -> String {
        self.manifest.version()
    }

    async fn content(&self) -> ShellCacheResult<Arc<dyn CacheStore>> {
        self.storage.open(&self.partitions.content).await
    }
}

/// Cache writes that run after the response has been handed back
#[derive(Default)]
struct WriteBack {
    tasks: Mutex<JoinSet<()>>,
}

impl WriteBack {
    fn spawn(&self, store: Arc<dyn CacheStore>, key: String, response: Response) {
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        // Reap finished writes so the set does not grow without bound
        while tasks.try_join_next().is_some() {}
        tasks.spawn(async move {
            match store.put(&key, response).await {
                Ok(()) => debug!("Cached {}", key),
                Err(e) => warn!("Failed to cache {}: {}", key, e),
            }
        });
    }

    async fn settle(&self) {
        let mut tasks = {
            let mut guard = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *guard)
        };
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Cache write task failed: {}", e);
            }
        }
    }
}

/// One worker version
pub struct ServiceWorker {
    ctx: WorkerContext,
    state: RwLock<WorkerState>,
    skip_waiting: AtomicBool,
    writes: WriteBack,
}

impl ServiceWorker {
    /// Create a freshly registered worker
    pub fn new(ctx: WorkerContext) -> Self {
        Self::resume(ctx, WorkerState::Installing, false)
    }

    /// Continue a worker from a persisted state
    pub fn resume(ctx: WorkerContext, state: WorkerState, skip_waiting: bool) -> Self {
        Self {
            ctx,
            state: RwLock::new(state),
            skip_waiting: AtomicBool::new(skip_waiting),
            writes: WriteBack::default(),
        }
    }

    pub fn context(&self) -> &WorkerContext {
        &self.ctx
    }

    /// Current lifecycle state (waits for a running install or activation)
    pub async fn state(&self) -> WorkerState {
        *self.state.read().await
    }

    /// Whether this version asked to skip the waiting phase
    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Snapshot of the lifecycle for persistence
    pub async fn record(&self) -> WorkerRecord {
        WorkerRecord::new(
            self.ctx.version(),
            self.state().await,
            self.skip_waiting_requested(),
        )
    }

    /// Install handler: stage the shell and request immediate activation
    ///
    /// On failure the worker becomes redundant and staging is discarded.
    pub async fn install(&self) -> ShellCacheResult<InstallReport> {
        let mut state = self.state.write().await;
        if *state != WorkerState::Installing {
            // Surface the illegal transition without changing state
            state.transition(LifecycleEvent::InstallSucceeded)?;
        }

        // Platform behavior: skip waiting is requested before staging starts
        self.skip_waiting.store(true, Ordering::SeqCst);

        match install::stage_shell(&self.ctx).await {
            Ok(report) => {
                *state = state.transition(LifecycleEvent::InstallSucceeded)?;
                info!(
                    "Installed worker {} ({} shell resource(s))",
                    self.ctx.version(),
                    report.staged.len()
                );
                Ok(report)
            }
            Err(e) => {
                *state = state.transition(LifecycleEvent::InstallFailed)?;
                Err(e)
            }
        }
    }

    /// Activate handler: reconcile content, or reset every partition
    ///
    /// Requests wait until this returns.
    pub async fn activate(&self) -> ShellCacheResult<Activation> {
        let mut state = self.state.write().await;
        *state = state.transition(LifecycleEvent::ActivationStarted)?;

        let activation = activate::run(&self.ctx).await;
        let event = match activation {
            Activation::Reconciled(_) => LifecycleEvent::ActivationCommitted,
            Activation::Reset { .. } => LifecycleEvent::ActivationFailed,
        };
        *state = state.transition(event)?;
        Ok(activation)
    }

    /// Fetch handler: route a request from a controlled page
    pub async fn handle_fetch(&self, request: &Request) -> ShellCacheResult<FetchOutcome> {
        let state = self.state().await;
        if !state.controls_clients() {
            debug!("Worker is {}, not intercepting {}", state, request.url);
            return Ok(FetchOutcome::Passthrough);
        }
        intercept::handle(&self.ctx, &self.writes, request).await
    }

    /// Message handler
    ///
    /// Unknown messages are ignored.
    pub async fn handle_message(&self, data: &str) -> ShellCacheResult<MessageOutcome> {
        match Message::parse(data) {
            Some(Message::SkipWaiting) => {
                self.skip_waiting.store(true, Ordering::SeqCst);
                Ok(MessageOutcome::SkipWaiting)
            }
            Some(Message::DownloadOffline) => {
                let report = self.download_offline().await?;
                Ok(MessageOutcome::Downloaded(report))
            }
            None => {
                debug!("Ignoring message {:?}", data);
                Ok(MessageOutcome::Ignored)
            }
        }
    }

    /// Backfill every manifest resource not yet in content
    pub async fn download_offline(&self) -> ShellCacheResult<PrefetchReport> {
        let _state = self.state.read().await;
        prefetch::download_offline(&self.ctx).await
    }

    /// Manifest keys not yet in content, sorted
    pub async fn missing_resources(&self) -> ShellCacheResult<Vec<String>> {
        let _state = self.state.read().await;
        prefetch::missing_keys(&self.ctx).await
    }

    /// Manifest recorded by the last successful activation
    pub async fn previous_manifest(&self) -> ShellCacheResult<Option<ResourceManifest>> {
        activate::previous_manifest(&self.ctx).await
    }

    /// Wait for every pending background cache write
    pub async fn settle(&self) {
        self.writes.settle().await;
    }
}
