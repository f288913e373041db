//! Tunnel configuration types

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::parser::{ConnectionPhrases, LogPatterns};

pub const DEFAULT_BINARY: &str = "cloudflared";
pub const DEFAULT_PROVIDER_DOMAIN: &str = "trycloudflare.com";
pub const DEFAULT_PROVIDER_NAME: &str = "Cloudflare";

/// Configuration for tunnel sessions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TunnelConfig {
    /// Tunnel binary to execute
    pub binary: PathBuf,

    /// Public domain whose subdomains are accepted as tunnel URLs
    pub provider_domain: String,

    /// Provider name shown in error messages
    pub provider_name: String,

    /// Phrasings accepted as "connection registered" on top of the built-in ones
    pub extra_connection_phrases: Vec<String>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from(DEFAULT_BINARY),
            provider_domain: DEFAULT_PROVIDER_DOMAIN.to_string(),
            provider_name: DEFAULT_PROVIDER_NAME.to_string(),
            extra_connection_phrases: Vec::new(),
        }
    }
}

impl TunnelConfig {
    /// Override the binary path
    pub fn with_binary(mut self, binary: impl AsRef<Path>) -> Self {
        self.binary = binary.as_ref().to_path_buf();
        self
    }

    /// Line patterns derived from this configuration
    pub fn log_patterns(&self) -> LogPatterns {
        LogPatterns::new(
            self.provider_domain.trim_start_matches('.'),
            ConnectionPhrases::with_extra(self.extra_connection_phrases.iter().cloned()),
        )
    }

    /// Error message once all attempts crashed
    pub fn max_retries_message(&self) -> String {
        format!(
            "Could not start {} tunnel, max retries reached.",
            self.provider_name
        )
    }
}
