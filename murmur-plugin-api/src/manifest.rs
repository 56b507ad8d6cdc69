//! Plugin manifest - declarative metadata read without executing plugin code
//!
//! Every plugin directory carries a `manifest.toml` describing what the
//! plugin is and what it needs. The host reads it before the plugin
//! library is ever loaded, so compatibility gates run against pure data.

use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use thiserror::Error;

/// Fields a manifest must declare. A manifest that omits any of these is
/// rejected with the full list of missing names.
const REQUIRED_FIELDS: &[&str] = &[
    "description",
    "required_platforms",
    "required_plugins",
    "version",
    "host_version_min",
    "host_version_max",
    "update_url",
    "resources",
    "packages",
    "author",
];

/// File name of the manifest inside a plugin directory
pub const MANIFEST_FILE: &str = "manifest.toml";

/// Declarative plugin metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Human-readable description
    pub description: String,
    /// Platform tags this plugin supports
    pub required_platforms: BTreeSet<String>,
    /// Other plugins that must be active first
    pub required_plugins: Vec<PluginRequirement>,
    /// Plugin's own version
    pub version: Version,
    /// Lowest host version this plugin supports
    pub host_version_min: Version,
    /// Highest host version this plugin supports
    pub host_version_max: Version,
    /// Where to fetch updated plugin builds; empty string means no
    /// update source
    pub update_url: String,
    /// Extra files to download alongside an update
    pub resources: Vec<ResourceLink>,
    /// System packages the plugin needs installed
    pub packages: Vec<String>,
    /// Plugin author
    pub author: String,
    /// Release notes, newest first
    #[serde(default)]
    pub changelog: Vec<String>,
}

/// A downloadable resource declared by a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLink {
    /// File name to store the resource under
    pub name: String,
    /// Where to fetch it from
    pub url: String,
}

/// A dependency on another plugin, either bare ("must be active") or
/// versioned ("must be active and satisfy at least one operator against
/// the given version")
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PluginRequirement {
    /// Plugin must be active, any version
    Name(String),
    /// Plugin must be active with a matching version
    Versioned {
        /// Required plugin name
        name: String,
        /// Operator characters (`=`, `<`, `>`); the requirement is
        /// satisfied if any one of them holds
        operators: String,
        /// Version to compare against
        version: Version,
    },
}

impl PluginRequirement {
    /// Name of the required plugin
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) => name,
            Self::Versioned { name, .. } => name,
        }
    }
}

/// Manifest loading/validation errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file absent from the plugin directory
    #[error("Manifest not found: {0}")]
    NotFound(String),

    /// Not valid TOML
    #[error("Manifest is not valid TOML: {0}")]
    Toml(String),

    /// One or more required fields absent
    #[error("Manifest is missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    /// IO error reading the file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PluginManifest {
    /// Parse a manifest from TOML text.
    ///
    /// Validates the presence of every required field against the raw
    /// document before deserializing, so the error reports all missing
    /// names at once.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let table: toml::Table =
            toml::from_str(text).map_err(|e| ManifestError::Toml(e.to_string()))?;

        let missing: Vec<String> = REQUIRED_FIELDS
            .iter()
            .filter(|f| !table.contains_key(**f))
            .map(|f| (*f).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ManifestError::MissingFields(missing));
        }

        table
            .try_into()
            .map_err(|e: toml::de::Error| ManifestError::Toml(e.to_string()))
    }

    /// Load the manifest from a plugin directory
    pub fn load(plugin_dir: &Path) -> Result<Self, ManifestError> {
        let path = plugin_dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Err(ManifestError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(&path)?;
        Self::parse(&text)
    }

    /// Update source, if one is declared
    pub fn update_url(&self) -> Option<&str> {
        if self.update_url.is_empty() {
            None
        } else {
            Some(&self.update_url)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FULL: &str = r#"
        description = "Core plugin | Basic functional"
        required_platforms = ["linux", "windows"]
        required_plugins = []
        version = "1.4.0"
        host_version_min = [1, 4, 0]
        host_version_max = [1, 4, "*"]
        update_url = ""
        resources = []
        packages = []
        author = "somebody"
        changelog = ["1.4.0 update"]
    "#;

    #[test]
    fn test_parse_full_manifest() {
        let manifest = PluginManifest::parse(FULL).unwrap();
        assert_eq!(manifest.version, Version::new(1, 4, 0));
        assert!(manifest.required_platforms.contains("linux"));
        assert!(manifest.update_url().is_none());
        assert_eq!(manifest.changelog.len(), 1);
    }

    #[test]
    fn test_missing_fields_are_all_reported() {
        let err = PluginManifest::parse("description = \"x\"").unwrap_err();
        match err {
            ManifestError::MissingFields(fields) => {
                assert!(fields.contains(&"author".to_string()));
                assert!(fields.contains(&"version".to_string()));
                assert!(fields.contains(&"required_platforms".to_string()));
                assert!(!fields.contains(&"description".to_string()));
                // changelog is optional
                assert!(!fields.contains(&"changelog".to_string()));
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_toml_is_rejected() {
        let err = PluginManifest::parse("not toml at all [").unwrap_err();
        assert!(matches!(err, ManifestError::Toml(_)));
    }

    #[test]
    fn test_plugin_requirement_forms() {
        let text = FULL.replace(
            "required_plugins = []",
            r#"required_plugins = ["lib", { name = "stt", operators = ">=", version = "1.2.0" }]"#,
        );
        let manifest = PluginManifest::parse(&text).unwrap();
        assert_eq!(manifest.required_plugins.len(), 2);
        assert_eq!(manifest.required_plugins[0].name(), "lib");
        assert_eq!(manifest.required_plugins[1].name(), "stt");
        match &manifest.required_plugins[1] {
            PluginRequirement::Versioned { operators, .. } => assert_eq!(operators, ">="),
            other => panic!("expected versioned requirement, got {other:?}"),
        }
    }

    #[test]
    fn test_load_from_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), FULL).unwrap();
        let manifest = PluginManifest::load(dir.path()).unwrap();
        assert_eq!(manifest.author, "somebody");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = PluginManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::NotFound(_)));
    }
}
