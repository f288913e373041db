//! Check the tunnel binary installation

use std::path::PathBuf;

use anyhow::{Result, bail};
use burrow_core::check_installation;
use clap::Args;

use crate::config::ConfigLoader;

/// Arguments for the check command
#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Tunnel binary to check (overrides config)
    #[arg(long)]
    pub binary: Option<PathBuf>,
}

/// Run the check command
pub async fn run(args: CheckArgs) -> Result<()> {
    let binary = match args.binary {
        Some(binary) => binary,
        None => ConfigLoader::load()?.binary,
    };

    match check_installation(&binary).await {
        Some(info) => {
            println!("{} {} ({})", binary.display(), info.version, info.path.display());
            Ok(())
        }
        None => bail!("{} is not installed or not on PATH", binary.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_check_missing_binary_fails() {
        let args = CheckArgs {
            binary: Some(PathBuf::from("burrow-definitely-not-installed")),
        };
        let err = run(args).await.unwrap_err();
        assert!(err.to_string().contains("not installed"));
    }
}
