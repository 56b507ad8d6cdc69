//! Plugin host errors

use murmur_plugin_api::{ManifestError, PluginError};
use std::path::PathBuf;
use thiserror::Error;

/// Errors from plugin discovery, activation, and dispatch
#[derive(Error, Debug)]
pub enum PluginHostError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to load plugin library: {0}")]
    Library(#[from] libloading::Error),

    #[error("Plugin API version mismatch: host expects {expected}, plugin has {found}")]
    ApiVersionMismatch { expected: u32, found: u32 },

    #[error("Plugin not found: {name}")]
    NotFound { name: String },

    #[error("No plugin library found in {}", dir.display())]
    LibraryNotFound { dir: PathBuf },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error(
        "Command alias {alias:?} from plugin {new_plugin:?} is already registered by {existing_plugin:?}"
    )]
    CommandConflict {
        alias: String,
        existing_plugin: String,
        new_plugin: String,
    },

    #[error("Plugin initialization failed: {0}")]
    Init(#[from] PluginError),

    #[error("Update failed: {0}")]
    Update(String),

    #[error("Package installation failed for {package:?}: {reason}")]
    PackageInstall { package: String, reason: String },
}
