//! Cloudflared CLI wrapper

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

/// Result of checking cloudflared installation
#[derive(Debug, Clone)]
pub struct CloudflaredInfo {
    pub version: String,
    pub path: PathBuf,
}

/// Check if the tunnel binary is installed and get its version
pub async fn check_installation(binary: &Path) -> Option<CloudflaredInfo> {
    let path = which::which(binary).ok()?;

    let output = Command::new(&path).arg("--version").output().await.ok()?;
    if !output.status.success() {
        return None;
    }

    let version_str = String::from_utf8_lossy(&output.stdout);
    Some(CloudflaredInfo {
        version: parse_version(&version_str).to_string(),
        path,
    })
}

/// Parse "cloudflared version 2024.12.0 (built 2024-12-01)"
fn parse_version(output: &str) -> &str {
    output.split_whitespace().nth(2).unwrap_or("unknown")
}

/// A fully resolved command line for one tunnel process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TunnelCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl TunnelCommand {
    /// Quick tunnel exposing `http://localhost:<local_port>`
    pub fn quick(binary: impl Into<PathBuf>, local_port: u16) -> Self {
        Self {
            program: binary.into(),
            args: vec![
                "tunnel".into(),
                "--url".into(),
                format!("http://localhost:{}", local_port).into(),
                "--no-autoupdate".into(),
            ],
        }
    }

    /// Build the process command with piped output
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl std::fmt::Display for TunnelCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_command_binds_local_port() {
        let command = TunnelCommand::quick("cloudflared", 1234);
        assert_eq!(command.program, PathBuf::from("cloudflared"));
        assert!(
            command
                .args
                .iter()
                .any(|a| a == "http://localhost:1234")
        );
        assert_eq!(
            command.to_string(),
            "cloudflared tunnel --url http://localhost:1234 --no-autoupdate"
        );
    }

    #[test]
    fn parse_version_from_banner() {
        assert_eq!(
            parse_version("cloudflared version 2024.12.0 (built 2024-12-01)"),
            "2024.12.0"
        );
        assert_eq!(parse_version("cloudflared"), "unknown");
    }

    #[tokio::test]
    async fn check_installation_missing_binary() {
        let info = check_installation(Path::new("burrow-definitely-not-installed")).await;
        assert!(info.is_none());
    }
}
