//! Shell staging

use super::WorkerContext;
use crate::error::{ShellCacheError, ShellCacheResult};
use crate::fetch::{CacheMode, Request, Response};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

/// What an install staged
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    /// Shell keys written to staging, in shell order
    pub staged: Vec<String>,
    /// Total body bytes staged
    pub bytes: usize,
}

/// Fetch every shell resource, then commit them to staging
///
/// Nothing is written until all fetches have succeeded. Any failure
/// deletes the staging partition.
pub(super) async fn stage_shell(ctx: &WorkerContext) -> ShellCacheResult<InstallReport> {
    let fetches = ctx.shell.keys().iter().map(|key| async move {
        let url = ctx.origin.resource_url(key);
        let request = Request::get(url.clone()).cache(CacheMode::Reload);
        let result = ctx.fetcher.fetch(&request).await;
        (key.as_str(), url, result)
    });

    let mut fetched: Vec<(String, Response)> = Vec::with_capacity(ctx.shell.len());
    let mut failure = None;
    for (key, url, result) in join_all(fetches).await {
        let outcome = match result {
            Ok(response) if response.is_ok() => Ok(response),
            Ok(response) => Err(ShellCacheError::HttpStatus {
                url,
                status: response.status,
            }),
            Err(e) => Err(e),
        };
        match outcome {
            Ok(response) => fetched.push((ctx.origin.resource_url(key), response)),
            Err(e) => {
                warn!("Shell resource {} failed: {}", key, e);
                failure.get_or_insert_with(|| (key.to_string(), e.to_string()));
            }
        }
    }

    if let Some((key, reason)) = failure {
        discard_staging(ctx).await;
        return Err(ShellCacheError::InstallFailed { key, reason });
    }

    match commit(ctx, fetched).await {
        Ok(report) => Ok(report),
        Err(e) => {
            discard_staging(ctx).await;
            Err(ShellCacheError::InstallFailed {
                key: ctx.partitions.staging.clone(),
                reason: e.to_string(),
            })
        }
    }
}

async fn commit(
    ctx: &WorkerContext,
    fetched: Vec<(String, Response)>,
) -> ShellCacheResult<InstallReport> {
    let staging = ctx.storage.open(&ctx.partitions.staging).await?;
    let mut report = InstallReport::default();
    for (key, (url, response)) in ctx.shell.keys().iter().zip(fetched) {
        report.bytes += response.body.len();
        staging.put(&url, response).await?;
        debug!("Staged {}", key);
        report.staged.push(key.clone());
    }
    Ok(report)
}

async fn discard_staging(ctx: &WorkerContext) {
    if let Err(e) = ctx.storage.delete(&ctx.partitions.staging).await {
        warn!("Failed to discard staging: {}", e);
    }
}
