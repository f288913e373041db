//! Caller-facing handle to a running tunnel session

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::state::TunnelStatus;

/// Live view of a tunnel session
///
/// Cloning is cheap; every clone observes the same session.
#[derive(Debug, Clone)]
pub struct TunnelHandle {
    rx: watch::Receiver<TunnelStatus>,
    cancel: CancellationToken,
}

impl TunnelHandle {
    pub(crate) fn new(rx: watch::Receiver<TunnelStatus>, cancel: CancellationToken) -> Self {
        Self { rx, cancel }
    }

    /// Latest known status, without blocking
    pub fn status(&self) -> TunnelStatus {
        self.rx.borrow().clone()
    }

    /// Public URL once connected
    pub fn url(&self) -> Option<String> {
        self.rx.borrow().url().map(str::to_string)
    }

    /// Wait for the next status change
    ///
    /// Returns `None` once nothing supervises the session anymore, so the
    /// status can no longer change.
    pub async fn changed(&mut self) -> Option<TunnelStatus> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }

    /// Stop supervising and terminate the tunnel process
    ///
    /// The status keeps its last value.
    pub fn close(&self) {
        if !self.cancel.is_cancelled() {
            info!("Closing tunnel");
            self.cancel.cancel();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tunnel::state::StatusCell;

    #[test]
    fn status_reflects_cell() {
        let cell = StatusCell::new();
        let handle = TunnelHandle::new(cell.subscribe(), CancellationToken::new());
        assert_eq!(handle.status(), TunnelStatus::Starting);
        assert!(handle.url().is_none());

        cell.set(TunnelStatus::Connected {
            url: "https://x.trycloudflare.com".to_string(),
        });
        assert_eq!(handle.url().as_deref(), Some("https://x.trycloudflare.com"));
    }

    #[tokio::test]
    async fn changed_returns_none_when_cell_dropped() {
        let cell = StatusCell::new();
        let mut handle = TunnelHandle::new(cell.subscribe(), CancellationToken::new());

        cell.set(TunnelStatus::error("failed"));
        assert_eq!(handle.changed().await, Some(TunnelStatus::error("failed")));

        drop(cell);
        assert_eq!(handle.changed().await, None);
        assert_eq!(handle.status(), TunnelStatus::error("failed"));
    }

    #[test]
    fn close_cancels_the_session() {
        let cancel = CancellationToken::new();
        let handle = TunnelHandle::new(StatusCell::new().subscribe(), cancel.clone());
        assert!(!handle.is_closed());
        handle.close();
        assert!(cancel.is_cancelled());
        assert!(handle.clone().is_closed());
    }
}
