//! burrow-core: expose a local service through a supervised tunnel process
//!
//! The crate runs an external tunneling client (cloudflared by default),
//! reads its console output, and turns it into a [`TunnelStatus`]:
//!
//! - **Log parsing** - [`tunnel::LogParser`] recognises the public URL and
//!   "connection registered" lines
//! - **Supervision** - [`tunnel::Supervisor`] restarts crashed processes, up
//!   to [`tunnel::MAX_ATTEMPTS`] attempts per session
//! - **Handle** - [`TunnelHandle`] gives callers the latest status without
//!   blocking
//!
//! # Quick Start
//!
//! ```no_run
//! use burrow_core::{TunnelStatus, open_tunnel};
//!
//! async fn example() -> Result<(), burrow_core::TunnelError> {
//!     let mut tunnel = open_tunnel(3000).await?;
//!
//!     while let Some(status) = tunnel.changed().await {
//!         match status {
//!             TunnelStatus::Connected { url } => println!("Ready at {url}"),
//!             TunnelStatus::Error { message, .. } => eprintln!("{message}"),
//!             TunnelStatus::Starting => continue,
//!         }
//!         break;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐ spawn  ┌─────────────────┐ output ┌───────────┐
//! │  Supervisor  │───────▶│ ProcessExecutor │───────▶│ LogParser │
//! │ (restart ≤5) │◀───────│  (cloudflared)  │        └─────┬─────┘
//! └──────┬───────┘ crash  └─────────────────┘              │
//!        │                                                 ▼
//!        └──────────────────────────────────────────▶ StatusCell ──▶ TunnelHandle
//! ```

pub mod error;
pub mod tunnel;

pub use error::TunnelError;
pub use tunnel::{
    TunnelConfig, TunnelHandle, TunnelStatus, check_installation, open_tunnel, open_tunnel_with,
};
