use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use burrow_core::TunnelConfig;
use directories::ProjectDirs;

use super::types::{RawBurrowConfig, RawTunnelSection};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<TunnelConfig> {
        let mut raw = RawBurrowConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path() {
            raw = Self::merge_raw(raw, Self::read_layer(&user_path)?);
        }

        // Layer 2: Project config
        raw = Self::merge_raw(raw, Self::read_layer(&Self::project_config_path())?);

        Ok(raw.finalize())
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "burrow").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with BURROW_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("BURROW_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".burrow/config.toml")
        }
    }

    /// Read one layer; a missing file is an empty layer
    fn read_layer(path: &Path) -> Result<RawBurrowConfig> {
        if !path.exists() {
            return Ok(RawBurrowConfig::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawBurrowConfig, overlay: RawBurrowConfig) -> RawBurrowConfig {
        RawBurrowConfig {
            tunnel: RawTunnelSection {
                binary: overlay.tunnel.binary.or(base.tunnel.binary),
                provider_domain: overlay
                    .tunnel
                    .provider_domain
                    .or(base.tunnel.provider_domain),
                provider_name: overlay.tunnel.provider_name.or(base.tunnel.provider_name),
                extra_connection_phrases: if overlay.tunnel.extra_connection_phrases.is_empty() {
                    base.tunnel.extra_connection_phrases
                } else {
                    overlay.tunnel.extra_connection_phrases
                },
            },
        }
    }
}
