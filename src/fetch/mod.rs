//! Network access
//!
//! The worker never talks to the network directly; it goes through a
//! [`Fetcher`], so tests can script responses and failures.

mod http;
mod scripted;

pub use http::HttpFetcher;
pub use scripted::ScriptedFetcher;

use crate::error::ShellCacheResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a request interacts with intermediate HTTP caches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    /// Normal HTTP caching
    #[default]
    Default,
    /// Force revalidation with the origin
    Reload,
}

/// An outgoing request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub method: String,
    pub cache: CacheMode,
}

impl Request {
    /// A GET request with default caching
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            cache: CacheMode::Default,
        }
    }

    /// A request with an explicit method
    pub fn with_method(url: impl Into<String>, method: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            ..Self::get(url)
        }
    }

    /// Set the cache mode
    pub fn cache(mut self, mode: CacheMode) -> Self {
        self.cache = mode;
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }
}

/// A response, either live or read back from a partition
///
/// The body is skipped by serde: disk partitions store it beside the
/// metadata as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// URL the response was fetched from
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Content type, if the origin reported one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl Response {
    /// A 200 response with a body
    pub fn ok(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::with_status(url, 200, body)
    }

    /// A response with an explicit status
    pub fn with_status(url: impl Into<String>, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status,
            content_type: None,
            body: body.into(),
        }
    }

    /// Whether the status is in the 2xx range
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ({} bytes)", self.status, self.url, self.body.len())
    }
}

/// Performs requests against the network
///
/// `Err` is reserved for failures where no response arrived at all; HTTP
/// error statuses come back as `Ok` responses with `is_ok() == false`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &Request) -> ShellCacheResult<Response>;
}
