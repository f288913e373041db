//! Supervised quick tunnels
//!
//! [`open_tunnel`] spawns the tunnel binary for a local port, restarts it on
//! crashes (up to [`MAX_ATTEMPTS`] attempts) and returns a [`TunnelHandle`]
//! whose status follows the binary's console output.

pub mod cloudflared;
pub mod config;
pub mod exec;
pub mod handle;
pub mod parser;
pub mod restart;
pub mod scripted;
pub mod state;
pub mod supervisor;

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::error::TunnelError;

pub use cloudflared::{CloudflaredInfo, TunnelCommand, check_installation};
pub use config::TunnelConfig;
pub use exec::{ProcessEvents, ProcessExecutor, ProcessExit, TokioExecutor};
pub use handle::TunnelHandle;
pub use parser::{ConnectionPhrases, LogEvent, LogLevel, LogParser, LogPatterns};
pub use restart::{MAX_ATTEMPTS, RestartPolicy};
pub use scripted::{ScriptStep, ScriptedExecutor};
pub use state::{StatusCell, TunnelStatus};
pub use supervisor::Supervisor;

/// Open a cloudflared quick tunnel to `http://localhost:<port>`
pub async fn open_tunnel(port: u16) -> Result<TunnelHandle, TunnelError> {
    open_tunnel_with(Arc::new(TokioExecutor), &TunnelConfig::default(), port).await
}

/// Open a tunnel using a specific executor and configuration
///
/// Resolves once the first attempt, and any restarts caused by crashes
/// reported during it, has settled. Failures of the tunnel itself show up in
/// [`TunnelHandle::status`]; only failing to spawn the first process is an
/// error here.
pub async fn open_tunnel_with(
    executor: Arc<dyn ProcessExecutor>,
    config: &TunnelConfig,
    port: u16,
) -> Result<TunnelHandle, TunnelError> {
    if port == 0 {
        return Err(TunnelError::InvalidPort(port));
    }

    let status = StatusCell::new();
    let cancel = CancellationToken::new();
    // Stop the session if the caller gives up before it settles
    let guard = cancel.clone().drop_guard();

    let handle = TunnelHandle::new(status.subscribe(), cancel.clone());
    let supervisor = Supervisor::new(executor, config, port, status, cancel);

    let (settled_tx, settled_rx) = oneshot::channel();
    tokio::spawn(supervisor.run(settled_tx));
    settled_rx
        .await
        .map_err(|_| TunnelError::SupervisorExited)??;

    guard.disarm();
    Ok(handle)
}
