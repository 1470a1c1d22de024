//! Messages from controlled pages

use super::PrefetchReport;
use std::fmt;

/// A recognized message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// Activate without waiting for old clients to close
    SkipWaiting,
    /// Download every manifest resource for offline use
    DownloadOffline,
}

impl Message {
    /// Parse message data; anything unrecognized is `None`
    pub fn parse(data: &str) -> Option<Self> {
        match data {
            "skipWaiting" => Some(Message::SkipWaiting),
            "downloadOffline" => Some(Message::DownloadOffline),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Message::SkipWaiting => "skipWaiting",
            Message::DownloadOffline => "downloadOffline",
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What handling a message did
#[derive(Debug, Clone)]
pub enum MessageOutcome {
    SkipWaiting,
    Downloaded(PrefetchReport),
    Ignored,
}
