use std::path::PathBuf;

use burrow_core::TunnelConfig;
use serde::Deserialize;

/// Config file as written by the user; every field optional so layers merge
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawBurrowConfig {
    #[serde(default)]
    pub tunnel: RawTunnelSection,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RawTunnelSection {
    pub binary: Option<PathBuf>,
    pub provider_domain: Option<String>,
    pub provider_name: Option<String>,
    #[serde(default)]
    pub extra_connection_phrases: Vec<String>,
}

impl RawBurrowConfig {
    /// Apply defaults for anything no layer set
    pub fn finalize(self) -> TunnelConfig {
        let defaults = TunnelConfig::default();
        TunnelConfig {
            binary: self.tunnel.binary.unwrap_or(defaults.binary),
            provider_domain: self
                .tunnel
                .provider_domain
                .unwrap_or(defaults.provider_domain),
            provider_name: self.tunnel.provider_name.unwrap_or(defaults.provider_name),
            extra_connection_phrases: self.tunnel.extra_connection_phrases,
        }
    }
}
