//! Open a tunnel and follow its status

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use burrow_core::tunnel::TokioExecutor;
use burrow_core::{TunnelStatus, open_tunnel_with};
use clap::Args;
use tracing::debug;

use crate::config::ConfigLoader;

/// Arguments for the open command
#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Local port to expose
    #[arg(short, long)]
    pub port: u16,

    /// Tunnel binary to run (overrides config)
    #[arg(long)]
    pub binary: Option<PathBuf>,

    /// Print each status as a JSON line
    #[arg(long)]
    pub json: bool,
}

/// Run the open command
pub async fn run(args: OpenArgs) -> Result<()> {
    let mut config = ConfigLoader::load()?;
    if let Some(binary) = &args.binary {
        config = config.with_binary(binary);
    }
    debug!(?config, "Loaded tunnel config");

    let mut tunnel = open_tunnel_with(Arc::new(TokioExecutor), &config, args.port).await?;

    let mut status = tunnel.status();
    loop {
        report(&status, &args)?;
        if let TunnelStatus::Error {
            message,
            suggestion,
        } = &status
        {
            tunnel.close();
            return Err(failure(message, suggestion.as_deref()));
        }

        status = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tunnel.close();
                return Ok(());
            }
            next = tunnel.changed() => match next {
                Some(next) => next,
                None => return Ok(()),
            },
        };
    }
}

fn report(status: &TunnelStatus, args: &OpenArgs) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string(status)?);
        return Ok(());
    }

    match status {
        TunnelStatus::Starting => {
            println!("Starting tunnel to http://localhost:{}...", args.port);
        }
        TunnelStatus::Connected { url } => {
            println!("Tunnel ready: {}", url);
            println!("Press Ctrl-C to stop");
        }
        // Printed by main through the error returned from `run`
        TunnelStatus::Error { .. } => {}
    }
    Ok(())
}

/// Error ending the command: the message, then the hint if there is one
fn failure(message: &str, suggestion: Option<&str>) -> anyhow::Error {
    match suggestion {
        Some(suggestion) => anyhow!("{}\nHint: {}", message, suggestion),
        None => anyhow!("{}", message),
    }
}
