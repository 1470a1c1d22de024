//! Request routing and the two caching strategies
//!
//! Only same-origin GET requests whose key is listed in the manifest are
//! intercepted. The root document is served online-first; every other
//! resource is served cache-first.

use super::{WorkerContext, WriteBack};
use crate::error::ShellCacheResult;
use crate::fetch::{Request, Response};
use crate::manifest::{ResourceManifest, ROOT_KEY};
use crate::origin::Origin;
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// How a request is handled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; the platform fetches it normally
    Passthrough,
    /// Network first, content as fallback
    OnlineFirst { key: String },
    /// Content first, network on miss
    CacheFirst { key: String },
}

/// Decide how to handle a request
pub fn route(origin: &Origin, manifest: &ResourceManifest, request: &Request) -> Route {
    if !request.is_get() {
        return Route::Passthrough;
    }
    let Some(key) = origin.request_key(&request.url) else {
        return Route::Passthrough;
    };
    if !manifest.contains(&key) {
        return Route::Passthrough;
    }
    if key == ROOT_KEY {
        Route::OnlineFirst { key }
    } else {
        Route::CacheFirst { key }
    }
}

/// Where a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    /// Served from content
    Cache,
    /// Fetched live
    Network,
    /// Network failed; served from content
    Fallback,
}

impl fmt::Display for ResponseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseSource::Cache => write!(f, "cache"),
            ResponseSource::Network => write!(f, "network"),
            ResponseSource::Fallback => write!(f, "fallback"),
        }
    }
}

/// Result of handling a request
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// The worker did not intercept the request
    Passthrough,
    Responded {
        response: Response,
        source: ResponseSource,
    },
}

pub(super) async fn handle(
    ctx: &WorkerContext,
    writes: &WriteBack,
    request: &Request,
) -> ShellCacheResult<FetchOutcome> {
    match route(&ctx.origin, &ctx.manifest, request) {
        Route::Passthrough => {
            debug!("Passing through {} {}", request.method, request.url);
            Ok(FetchOutcome::Passthrough)
        }
        Route::OnlineFirst { key } => online_first(ctx, writes, request, &key).await,
        Route::CacheFirst { key } => cache_first(ctx, writes, request, &key).await,
    }
}

async fn cache_first(
    ctx: &WorkerContext,
    writes: &WriteBack,
    request: &Request,
    key: &str,
) -> ShellCacheResult<FetchOutcome> {
    let content = ctx.content().await?;
    let url = ctx.origin.resource_url(key);

    match content.get(&url).await {
        Ok(Some(response)) => {
            debug!("Cache hit for {}", key);
            return Ok(FetchOutcome::Responded {
                response,
                source: ResponseSource::Cache,
            });
        }
        Ok(None) => debug!("Cache miss for {}", key),
        Err(e) => warn!("Cache lookup for {} failed, fetching: {}", key, e),
    }

    let response = ctx.fetcher.fetch(request).await?;
    if response.is_ok() {
        writes.spawn(content, url, response.clone());
    }
    Ok(FetchOutcome::Responded {
        response,
        source: ResponseSource::Network,
    })
}

async fn online_first(
    ctx: &WorkerContext,
    writes: &WriteBack,
    request: &Request,
    key: &str,
) -> ShellCacheResult<FetchOutcome> {
    let content = ctx.content().await?;
    let url = ctx.origin.resource_url(key);

    let err = match ctx.fetcher.fetch(request).await {
        Ok(response) => {
            if response.is_ok() {
                writes.spawn(content, url, response.clone());
            }
            return Ok(FetchOutcome::Responded {
                response,
                source: ResponseSource::Network,
            });
        }
        Err(e) => e,
    };

    debug!("Network failed for {}, trying cache: {}", key, err);
    match content.get(&url).await {
        Ok(Some(response)) => Ok(FetchOutcome::Responded {
            response,
            source: ResponseSource::Fallback,
        }),
        Ok(None) => Err(err),
        Err(lookup) => {
            warn!("Cache fallback for {} failed: {}", key, lookup);
            Err(err)
        }
    }
}
