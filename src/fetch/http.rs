//! HTTP fetcher backed by ureq
//!
//! ureq is blocking, so each request runs on tokio's blocking pool.

use super::{CacheMode, Fetcher, Request, Response};
use crate::config::schema::FetchConfig;
use crate::error::{ShellCacheError, ShellCacheResult};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Largest body accepted from the origin
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// Fetcher that performs real HTTP requests
#[derive(Clone)]
pub struct HttpFetcher {
    agent: Agent,
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher from the `[fetch]` config section
    pub fn new(config: &FetchConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(config.timeout_secs.map(Duration::from_secs))
            .build()
            .into();
        Self {
            agent,
            user_agent: config.user_agent.clone(),
        }
    }

    fn fetch_blocking(
        agent: &Agent,
        user_agent: &str,
        request: &Request,
    ) -> ShellCacheResult<Response> {
        let url = request.url.as_str();
        let (cache_control, pragma) = match request.cache {
            CacheMode::Default => (None, None),
            CacheMode::Reload => (Some("no-cache"), Some("no-cache")),
        };

        macro_rules! with_headers {
            ($builder:expr) => {{
                let mut builder = $builder.header("User-Agent", user_agent);
                if let Some(value) = cache_control {
                    builder = builder.header("Cache-Control", value);
                }
                if let Some(value) = pragma {
                    builder = builder.header("Pragma", value);
                }
                builder
            }};
        }

        let result = match request.method.as_str() {
            "GET" => with_headers!(agent.get(url)).call(),
            "HEAD" => with_headers!(agent.head(url)).call(),
            "DELETE" => with_headers!(agent.delete(url)).call(),
            "POST" => with_headers!(agent.post(url)).send_empty(),
            "PUT" => with_headers!(agent.put(url)).send_empty(),
            "PATCH" => with_headers!(agent.patch(url)).send_empty(),
            other => {
                return Err(ShellCacheError::User(format!(
                    "unsupported request method: {}",
                    other
                )))
            }
        };

        let mut response = result.map_err(|e| ShellCacheError::network(url, e.to_string()))?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| ShellCacheError::network(url, format!("reading body: {}", e)))?;

        debug!("{} {} -> {} ({} bytes)", request.method, url, status, body.len());
        Ok(Response {
            url: request.url.clone(),
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> ShellCacheResult<Response> {
        let agent = self.agent.clone();
        let user_agent = self.user_agent.clone();
        let request = request.clone();
        tokio::task::spawn_blocking(move || Self::fetch_blocking(&agent, &user_agent, &request))
            .await
            .map_err(|e| ShellCacheError::Internal(format!("fetch task failed: {}", e)))?
    }
}
