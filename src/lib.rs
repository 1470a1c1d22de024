//! shellcache - offline asset cache for web application shells
//!
//! Keeps a versioned cache of an application's build output in step with a
//! resource manifest: stages the shell on install, prunes stale content on
//! activation and serves requests cache-first (online-first for the root
//! document).

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod journal;
pub mod lifecycle;
pub mod manifest;
pub mod origin;
pub mod store;
pub mod ui;
pub mod worker;

pub use error::{ShellCacheError, ShellCacheResult};
