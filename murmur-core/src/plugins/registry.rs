//! Plugin registry - tracks disabled plugins
//!
//! Every plugin found in a plugin directory is active by default; the
//! registry only records the ones the user switched off. Stored as TOML
//! next to the plugins themselves.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use super::error::PluginHostError;

/// Set of plugins the user has disabled
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PluginRegistry {
    #[serde(default)]
    pub disabled: BTreeSet<String>,
}

impl PluginRegistry {
    /// Load registry from a TOML file.
    ///
    /// Returns an empty registry if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, PluginHostError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let registry: Self =
            toml::from_str(&content).map_err(|e| PluginHostError::Registry(e.to_string()))?;
        Ok(registry)
    }

    /// Save registry to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), PluginHostError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| PluginHostError::Registry(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// A plugin is enabled unless explicitly disabled
    pub fn is_enabled(&self, name: &str) -> bool {
        !self.disabled.contains(name)
    }

    /// Enable a plugin
    pub fn enable(&mut self, name: &str) {
        self.disabled.remove(name);
    }

    /// Disable a plugin
    pub fn disable(&mut self, name: &str) {
        self.disabled.insert(name.to_string());
    }
}
