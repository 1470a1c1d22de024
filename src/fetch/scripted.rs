//! Scripted fetcher
//!
//! Serves canned responses and failures per URL and records every request,
//! so lifecycle behavior can be exercised without a network. URLs with no
//! script fail like an unreachable host.

use super::{Fetcher, Request, Response};
use crate::error::{ShellCacheError, ShellCacheResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
enum Script {
    Respond(Response),
    Fail(String),
}

/// Fetcher driven by per-URL scripts
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<Request>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with a 200 and `body`
    pub fn respond(&self, url: &str, body: impl Into<Vec<u8>>) -> &Self {
        self.respond_status(url, 200, body)
    }

    /// Answer `url` with an explicit status
    pub fn respond_status(&self, url: &str, status: u16, body: impl Into<Vec<u8>>) -> &Self {
        let response = Response::with_status(url, status, body);
        self.lock_scripts()
            .insert(url.to_string(), Script::Respond(response));
        self
    }

    /// Fail `url` with a network error
    pub fn fail(&self, url: &str, reason: &str) -> &Self {
        self.lock_scripts()
            .insert(url.to_string(), Script::Fail(reason.to_string()));
        self
    }

    /// Every request seen so far, in order
    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of requests seen so far
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Number of requests made to `url`
    pub fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    /// Forget recorded requests, keeping scripts
    pub fn reset_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn lock_scripts(&self) -> std::sync::MutexGuard<'_, HashMap<String, Script>> {
        self.scripts.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &Request) -> ShellCacheResult<Response> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let script = self.lock_scripts().get(&request.url).cloned();
        match script {
            Some(Script::Respond(response)) => Ok(response),
            Some(Script::Fail(reason)) => Err(ShellCacheError::network(&request.url, reason)),
            None => Err(ShellCacheError::network(&request.url, "connection refused")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn serves_scripts_and_records_calls() {
        let fetcher = ScriptedFetcher::new();
        fetcher
            .respond("https://app.test/a.js", "a")
            .respond_status("https://app.test/gone.js", 404, "")
            .fail("https://app.test/down.js", "reset by peer");

        let ok = fetcher.fetch(&Request::get("https://app.test/a.js")).await.unwrap();
        assert!(ok.is_ok());
        let gone = fetcher.fetch(&Request::get("https://app.test/gone.js")).await.unwrap();
        assert_eq!(gone.status, 404);
        assert!(fetcher.fetch(&Request::get("https://app.test/down.js")).await.is_err());
        assert!(fetcher.fetch(&Request::get("https://app.test/none")).await.is_err());

        assert_eq!(fetcher.call_count(), 4);
        assert_eq!(fetcher.calls_to("https://app.test/a.js"), 1);
        fetcher.reset_calls();
        assert_eq!(fetcher.call_count(), 0);
    }
}
