//! Error types for burrow-core

use std::path::PathBuf;

use thiserror::Error;

/// Errors that prevent a tunnel from being opened at all
///
/// Failures of the tunnel itself (crashes, unexpected output) are reported
/// through [`crate::tunnel::TunnelStatus::Error`] on the handle instead.
#[derive(Error, Debug)]
pub enum TunnelError {
    #[error("Tunnel binary not found: {}", binary.display())]
    BinaryNotFound { binary: PathBuf },

    #[error("Failed to spawn tunnel process: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Invalid local port: {0}")]
    InvalidPort(u16),

    #[error("Tunnel supervisor exited before the first attempt settled")]
    SupervisorExited,
}
