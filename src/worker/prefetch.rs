//! Offline download of every manifest resource

use super::WorkerContext;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::fetch::Request;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// One resource that could not be downloaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefetchFailure {
    pub key: String,
    pub reason: String,
}

/// Outcome of an offline download
///
/// Successful downloads are stored even when others fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PrefetchReport {
    /// Keys downloaded and stored, sorted
    pub stored: Vec<String>,
    /// Keys that failed, sorted by key
    pub failed: Vec<PrefetchFailure>,
}

impl PrefetchReport {
    /// Whether every missing resource was stored
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Treat any failure as an error
    pub fn into_result(self) -> ShellCacheResult<Self> {
        if self.is_complete() {
            Ok(self)
        } else {
            Err(ShellCacheError::PrefetchIncomplete {
                failed: self.failed.into_iter().map(|f| f.key).collect(),
            })
        }
    }
}

/// Manifest keys with no entry in content
pub(super) async fn missing_keys(ctx: &WorkerContext) -> ShellCacheResult<Vec<String>> {
    let content = ctx.content().await?;
    let cached: BTreeSet<String> = content
        .keys()
        .await?
        .iter()
        .filter_map(|url| ctx.origin.relative_key(url))
        .collect();
    Ok(ctx
        .manifest
        .keys()
        .filter(|key| !cached.contains(*key))
        .map(str::to_string)
        .collect())
}

pub(super) async fn download_offline(ctx: &WorkerContext) -> ShellCacheResult<PrefetchReport> {
    let missing = missing_keys(ctx).await?;
    if missing.is_empty() {
        debug!("Every manifest resource is already cached");
        return Ok(PrefetchReport::default());
    }

    info!("Downloading {} resource(s) for offline use", missing.len());
    let content = ctx.content().await?;
    let content = &content;
    let results: Vec<(String, ShellCacheResult<()>)> = stream::iter(missing)
        .map(|key| async move {
            let url = ctx.origin.resource_url(&key);
            let result = async {
                let response = ctx.fetcher.fetch(&Request::get(url.clone())).await?;
                if !response.is_ok() {
                    return Err(ShellCacheError::HttpStatus {
                        url: url.clone(),
                        status: response.status,
                    });
                }
                content.put(&url, response).await
            }
            .await;
            (key, result)
        })
        .buffer_unordered(ctx.prefetch_concurrency)
        .collect()
        .await;

    let mut report = PrefetchReport::default();
    for (key, result) in results {
        match result {
            Ok(()) => report.stored.push(key),
            Err(e) => {
                warn!("Offline download of {} failed: {}", key, e);
                report.failed.push(PrefetchFailure {
                    key,
                    reason: e.to_string(),
                });
            }
        }
    }
    report.stored.sort();
    report.failed.sort_by(|a, b| a.key.cmp(&b.key));
    Ok(report)
}
