//! Instance configuration
//!
//! Loaded from `config.toml` in the murmur config directory. Every field
//! has a default so a missing or partial file still yields a runnable
//! instance.

use murmur_plugin_api::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Host version advertised to plugins for compatibility checks
pub const HOST_VERSION: Version = Version::new(1, 4, 0);

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Instance-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceConfig {
    /// Platform tag plugins are gated on (e.g. "linux", "windows")
    pub platform: String,
    /// Pre-release marker appended to version displays ("indev", "beta")
    pub release_channel: Option<String>,
    /// Command prefixes the dispatcher answers to
    pub prefixes: Vec<String>,
    /// User ids whose commands are always authorized
    pub owner_ids: BTreeSet<u64>,
    /// Check update sources during plugin activation
    pub auto_update: bool,
    /// Accepted for configs shared with graphical front ends; the CLI
    /// host ignores it
    pub gui: bool,
    /// How many recent messages to scan when resolving a replied-to
    /// message that the transport did not deliver inline
    pub history_lookback: usize,
    /// Capacity of the tokenizer result cache
    pub token_cache_size: usize,
    /// Command used to install plugin-required system packages; the
    /// package name is appended as the final argument
    pub package_installer: Vec<String>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            platform: default_platform().to_string(),
            release_channel: None,
            prefixes: vec!["mur".to_string()],
            owner_ids: BTreeSet::new(),
            auto_update: true,
            gui: false,
            history_lookback: 50,
            token_cache_size: 256,
            package_installer: Vec::new(),
        }
    }
}

fn default_platform() -> &'static str {
    if cfg!(target_os = "windows") {
        "windows"
    } else if cfg!(target_os = "macos") {
        "macos"
    } else {
        "linux"
    }
}

impl InstanceConfig {
    /// Load configuration from a TOML file; missing file yields defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.prefixes.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one command prefix is required".to_string(),
            ));
        }
        if self.prefixes.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::Invalid(
                "command prefixes must be non-empty".to_string(),
            ));
        }
        if self.token_cache_size == 0 {
            return Err(ConfigError::Invalid(
                "token_cache_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Version string for display, with the release channel appended
    pub fn version_display(&self) -> String {
        match &self.release_channel {
            Some(channel) => format!("{HOST_VERSION} {channel}"),
            None => HOST_VERSION.to_string(),
        }
    }
}
