//! Origin handling and request key derivation
//!
//! Cache entries are keyed by absolute URL; the manifest speaks in logical
//! keys relative to the origin. This module converts between the two.

use crate::error::{ShellCacheError, ShellCacheResult};
use crate::manifest::ROOT_KEY;
use std::fmt;
use url::Url;

/// Query marker used for cache-busting; everything after it is ignored
const VERSION_QUERY: &str = "?v=";

/// Serialized origin of the application, e.g. `https://app.example.com`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin(String);

impl Origin {
    /// Parse and normalize an origin
    ///
    /// Rejects anything carrying a path, query or fragment, since keys are
    /// derived by stripping the origin off the front of request URLs.
    pub fn parse(origin: &str) -> ShellCacheResult<Self> {
        let invalid = |reason: &str| ShellCacheError::OriginInvalid {
            origin: origin.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(origin).map_err(|e| invalid(&e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(invalid("scheme must be http or https"));
        }
        if url.host_str().is_none() {
            return Err(invalid("missing host"));
        }
        if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("origin must not carry a path, query or fragment"));
        }

        Ok(Self(url.origin().ascii_serialization()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical request URL for a logical key
    pub fn resource_url(&self, key: &str) -> String {
        if key == ROOT_KEY {
            format!("{}/", self.0)
        } else {
            format!("{}/{}", self.0, key)
        }
    }

    /// Logical key of a stored cache entry's URL
    ///
    /// Returns `None` for URLs outside this origin. An empty path maps to
    /// the root key.
    pub fn relative_key(&self, url: &str) -> Option<String> {
        let path = self.strip(url)?;
        if path.is_empty() {
            Some(ROOT_KEY.to_string())
        } else {
            Some(path.to_string())
        }
    }

    /// Logical key used to route an intercepted request
    ///
    /// Truncates at a `?v=` cache-busting marker and maps the bare origin,
    /// fragment-routed URLs (`origin/#...`) and the empty path to the root
    /// key. Any other query string is kept, so such URLs normally miss the
    /// manifest and are passed through.
    pub fn request_key(&self, url: &str) -> Option<String> {
        let rest = url.strip_prefix(self.0.as_str())?;
        let mut key = self.strip(url)?;
        if let Some(idx) = key.find(VERSION_QUERY) {
            key = &key[..idx];
        }
        if rest.is_empty() || rest.starts_with("/#") || key.is_empty() {
            return Some(ROOT_KEY.to_string());
        }
        Some(key.to_string())
    }

    /// Path after `origin/`, or `None` when the URL belongs elsewhere
    fn strip<'a>(&self, url: &'a str) -> Option<&'a str> {
        let rest = url.strip_prefix(self.0.as_str())?;
        if rest.is_empty() {
            return Some("");
        }
        // `https://app.test.evil` shares the prefix but not the origin
        rest.strip_prefix('/')
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
