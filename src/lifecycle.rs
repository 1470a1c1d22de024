//! Worker lifecycle state machine
//!
//! A worker version moves through install and activation exactly once:
//!
//! | State | Meaning |
//! |-------|---------|
//! | Installing | Shell resources are being prefetched into staging |
//! | Staged | Staging holds the full shell, waiting to activate |
//! | Redundant | Install failed, the previous version keeps serving |
//! | Activating | Reconciliation in progress, requests are held |
//! | Reconciled | Content matches the current manifest, requests are served |
//! | Reset | Activation failed and every partition was dropped |
//!
//! `Reset` may be activated again; with the snapshot gone that attempt
//! behaves like a first install.

use crate::error::{ShellCacheError, ShellCacheResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of one worker version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Installing,
    Staged,
    Redundant,
    Activating,
    Reconciled,
    Reset,
}

/// Events reported by the install and activate handlers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    InstallSucceeded,
    InstallFailed,
    ActivationStarted,
    ActivationCommitted,
    ActivationFailed,
}

impl WorkerState {
    /// Apply an event, returning the next state
    pub fn transition(self, event: LifecycleEvent) -> ShellCacheResult<WorkerState> {
        use LifecycleEvent::*;
        use WorkerState::*;

        let next = match (self, event) {
            (Installing, InstallSucceeded) => Staged,
            (Installing, InstallFailed) => Redundant,
            (Staged | Reset, ActivationStarted) => Activating,
            (Activating, ActivationCommitted) => Reconciled,
            (Activating, ActivationFailed) => Reset,
            (state, event) => return Err(ShellCacheError::InvalidTransition { state, event }),
        };
        Ok(next)
    }

    /// Whether the worker intercepts requests in this state
    pub fn controls_clients(&self) -> bool {
        matches!(self, Self::Reconciled)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Installing => "installing",
            Self::Staged => "staged",
            Self::Redundant => "redundant",
            Self::Activating => "activating",
            Self::Reconciled => "reconciled",
            Self::Reset => "reset",
        };
        write!(f, "{}", name)
    }
}
