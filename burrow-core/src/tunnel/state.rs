//! Tunnel status and the shared cell that holds it

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// Current status of a tunnel session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TunnelStatus {
    /// Process is running, no public URL confirmed yet
    Starting,
    /// A public URL was captured and the provider registered a connection
    Connected { url: String },
    /// The session failed and will not recover
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        suggestion: Option<String>,
    },
}

impl TunnelStatus {
    /// Build an error status without a suggestion
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            suggestion: None,
        }
    }

    /// Error is the only status nothing can move away from
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Public URL if connected
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Connected { url } => Some(url),
            _ => None,
        }
    }
}

impl Default for TunnelStatus {
    fn default() -> Self {
        Self::Starting
    }
}

impl std::fmt::Display for TunnelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Starting => write!(f, "starting"),
            Self::Connected { url } => write!(f, "connected: {}", url),
            Self::Error { message, .. } => write!(f, "error: {}", message),
        }
    }
}

/// Single-writer, multi-reader cell holding the session's [`TunnelStatus`]
///
/// Writers are the supervisor and the log parser of the current attempt.
/// Readers get the latest value without blocking.
#[derive(Debug, Clone)]
pub struct StatusCell {
    tx: Arc<watch::Sender<TunnelStatus>>,
}

impl StatusCell {
    /// Create a cell initialized to [`TunnelStatus::Starting`]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(TunnelStatus::Starting);
        Self { tx: Arc::new(tx) }
    }

    /// Latest status
    pub fn get(&self) -> TunnelStatus {
        self.tx.borrow().clone()
    }

    /// Replace the status, unless the session already failed
    ///
    /// Returns whether the value changed. Setting the current value again
    /// does not notify subscribers.
    pub fn set(&self, next: TunnelStatus) -> bool {
        self.tx.send_if_modified(|current| {
            if current.is_terminal() {
                debug!(ignored = ?next, "Tunnel status is terminal");
                return false;
            }
            if *current == next {
                return false;
            }
            debug!("Tunnel status: {:?} -> {:?}", current, next);
            *current = next;
            true
        })
    }

    /// Receiver notified on every replacement
    pub fn subscribe(&self) -> watch::Receiver<TunnelStatus> {
        self.tx.subscribe()
    }
}

impl Default for StatusCell {
    fn default() -> Self {
        Self::new()
    }
}
