//! Plugin activation pipeline
//!
//! Activation walks each plugin through a fixed sequence of gates:
//! update check, platform gate, host version gate, dependency gate,
//! package requirements, then finally loading and running the plugin
//! library. A gate failure errors the plugin without touching the others.

use super::error::PluginHostError;
use crate::config::HOST_VERSION;
use murmur_plugin_api::manifest::ManifestError;
use murmur_plugin_api::{
    CompareOp, PluginManifest, PluginRequirement, Version, compare_versions,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Where a plugin ended up after activation
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleState {
    /// Library loaded and `on_load` succeeded
    Active,
    /// Deliberately not activated (disabled, or the plugin exited cleanly)
    Skipped { reason: String },
    /// A gate refused the plugin or activation failed
    Errored { error: String },
}

impl LifecycleState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }
}

/// A gate refused the plugin
#[derive(Error, Debug)]
pub enum ActivationGateError {
    #[error("Platform {platform:?} is not supported (needs one of: {required})")]
    PlatformUnsupported { platform: String, required: String },

    #[error("Host version {host} is outside the supported range {min} .. {max}")]
    IncompatibleHost {
        host: Version,
        min: Version,
        max: Version,
    },

    #[error("Required plugin {name:?} is not active")]
    MissingDependency { name: String },

    #[error("Required plugin {name:?} version {found} does not satisfy {operators}{required}")]
    DependencyVersionMismatch {
        name: String,
        operators: String,
        required: Version,
        found: Version,
    },
}

/// Platform gate: an empty `required_platforms` list means "anywhere"
pub fn check_platform(
    manifest: &PluginManifest,
    platform: &str,
) -> Result<(), ActivationGateError> {
    if manifest.required_platforms.is_empty() || manifest.required_platforms.contains(platform) {
        return Ok(());
    }
    Err(ActivationGateError::PlatformUnsupported {
        platform: platform.to_string(),
        required: manifest
            .required_platforms
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Host version gate: the host must lie in the manifest's closed
/// `[host_version_min, host_version_max]` interval
pub fn check_host_compatibility(manifest: &PluginManifest) -> Result<(), ActivationGateError> {
    if HOST_VERSION.in_range(&manifest.host_version_min, &manifest.host_version_max) {
        return Ok(());
    }
    Err(ActivationGateError::IncompatibleHost {
        host: HOST_VERSION,
        min: manifest.host_version_min,
        max: manifest.host_version_max,
    })
}

/// Dependency gate: every required plugin must already be active, and a
/// versioned requirement must satisfy at least one of its operators
pub fn check_required_plugins(
    manifest: &PluginManifest,
    active: &HashMap<String, Version>,
) -> Result<(), ActivationGateError> {
    for requirement in &manifest.required_plugins {
        let found = active.get(requirement.name()).copied().ok_or_else(|| {
            ActivationGateError::MissingDependency {
                name: requirement.name().to_string(),
            }
        })?;

        if let PluginRequirement::Versioned {
            name,
            operators,
            version,
        } = requirement
        {
            let satisfied = operators
                .chars()
                .filter_map(CompareOp::from_char)
                .any(|op| compare_versions(&found, version, op));
            if !satisfied {
                return Err(ActivationGateError::DependencyVersionMismatch {
                    name: name.clone(),
                    operators: operators.clone(),
                    required: *version,
                    found,
                });
            }
        }
    }
    Ok(())
}

/// Install a plugin's required system packages through the configured
/// installer command
pub async fn install_packages(
    installer: &[String],
    packages: &[String],
) -> Result<(), PluginHostError> {
    if packages.is_empty() {
        return Ok(());
    }
    let Some((program, base_args)) = installer.split_first() else {
        return Err(PluginHostError::PackageInstall {
            package: packages[0].clone(),
            reason: "no package installer configured".to_string(),
        });
    };

    for package in packages {
        tracing::info!(package = %package, "Installing required package");
        let output = tokio::process::Command::new(program)
            .args(base_args)
            .arg(package)
            .output()
            .await
            .map_err(|e| PluginHostError::PackageInstall {
                package: package.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!(
            package = %package,
            stdout = %String::from_utf8_lossy(&output.stdout),
            stderr = %String::from_utf8_lossy(&output.stderr),
            "Installer finished"
        );
        if !output.status.success() {
            return Err(PluginHostError::PackageInstall {
                package: package.clone(),
                reason: format!("installer exited with {}", output.status),
            });
        }
    }
    Ok(())
}

// ─── Updates ─────────────────────────────────────────────────────────

/// Outcome of an update check
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateStatus {
    /// Manifest declares no update source
    NoSource,
    /// Fetched build matches what is installed
    UpToDate,
    /// A new build (and its resources) was written
    Updated,
}

/// Downloads plugin builds and declared resources.
///
/// A content hash of the last installed build is kept in the cache
/// directory; the fetched build is only written when its hash differs.
pub struct Updater {
    http: reqwest::Client,
    cache_dir: PathBuf,
}

impl Updater {
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            http: reqwest::Client::new(),
            cache_dir,
        }
    }

    /// Check the plugin's update source and install a new build if one
    /// is available
    pub async fn update_plugin(
        &self,
        name: &str,
        manifest: &PluginManifest,
        plugin_dir: &Path,
        library_path: &Path,
    ) -> Result<UpdateStatus, PluginHostError> {
        let Some(url) = manifest.update_url() else {
            return Ok(UpdateStatus::NoSource);
        };

        let bytes = self
            .fetch(url)
            .await
            .map_err(|e| PluginHostError::Update(e.to_string()))?;
        let digest = blake3::hash(&bytes).to_hex().to_string();

        let hash_path = self.cache_dir.join(format!("{name}.hash"));
        let previous = self.installed_hash(&hash_path, library_path);
        if previous.as_deref() == Some(digest.as_str()) {
            // backfill the cache when the hash was computed from disk
            if !hash_path.exists() {
                if !self.cache_dir.exists() {
                    std::fs::create_dir_all(&self.cache_dir)?;
                }
                std::fs::write(&hash_path, &digest)?;
            }
            return Ok(UpdateStatus::UpToDate);
        }

        tracing::info!(plugin = %name, "Installing updated plugin build");
        std::fs::write(library_path, &bytes)?;
        if !self.cache_dir.exists() {
            std::fs::create_dir_all(&self.cache_dir)?;
        }
        std::fs::write(&hash_path, &digest)?;

        self.download_resources(manifest, plugin_dir).await?;
        Ok(UpdateStatus::Updated)
    }

    /// Hash of the currently installed build: the cached value when one
    /// exists, otherwise computed from the library file on disk so a
    /// fresh install of the current build is not mistaken for an update
    fn installed_hash(&self, hash_path: &Path, library_path: &Path) -> Option<String> {
        if let Ok(cached) = std::fs::read_to_string(hash_path) {
            return Some(cached);
        }
        let bytes = std::fs::read(library_path).ok()?;
        Some(blake3::hash(&bytes).to_hex().to_string())
    }

    async fn download_resources(
        &self,
        manifest: &PluginManifest,
        plugin_dir: &Path,
    ) -> Result<(), PluginHostError> {
        if manifest.resources.is_empty() {
            return Ok(());
        }
        let resources_dir = plugin_dir.join("resources");
        if !resources_dir.exists() {
            std::fs::create_dir_all(&resources_dir)?;
        }

        for resource in &manifest.resources {
            let bytes = self
                .fetch(&resource.url)
                .await
                .map_err(|e| PluginHostError::Update(e.to_string()))?;
            std::fs::write(resources_dir.join(&resource.name), bytes)?;
        }
        Ok(())
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, reqwest::Error> {
        let response = self.http.get(url).send().await?.error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }
}

// ─── Activation ordering ─────────────────────────────────────────────

/// A plugin directory found during discovery
pub struct DiscoveredPlugin {
    pub name: String,
    pub dir: PathBuf,
    pub manifest: Result<PluginManifest, ManifestError>,
}

/// Order plugins so that dependencies activate before their dependents.
///
/// Only dependencies on other discovered plugins constrain the order;
/// ties are broken by name so the result is deterministic. If a
/// dependency cycle remains, the affected plugins are appended in name
/// order with a warning and their dependency gates decide their fate.
pub fn activation_order(plugins: Vec<DiscoveredPlugin>) -> Vec<DiscoveredPlugin> {
    let mut by_name: BTreeMap<String, DiscoveredPlugin> = plugins
        .into_iter()
        .map(|p| (p.name.clone(), p))
        .collect();

    let mut indegree: BTreeMap<String, usize> =
        by_name.keys().map(|n| (n.clone(), 0)).collect();
    let mut dependents: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (name, plugin) in &by_name {
        let Ok(manifest) = &plugin.manifest else {
            continue;
        };
        for requirement in &manifest.required_plugins {
            let dep = requirement.name();
            if dep != name && by_name.contains_key(dep) {
                *indegree.get_mut(name).expect("indegree entry") += 1;
                dependents.entry(dep.to_string()).or_default().push(name.clone());
            }
        }
    }

    let mut ready: Vec<String> = indegree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(name, _)| name.clone())
        .collect();
    let mut order = Vec::new();

    while let Some(name) = ready.first().cloned() {
        ready.remove(0);
        for dependent in dependents.remove(&name).unwrap_or_default() {
            let degree = indegree.get_mut(&dependent).expect("indegree entry");
            *degree -= 1;
            if *degree == 0 {
                let pos = ready.binary_search(&dependent).unwrap_or_else(|p| p);
                ready.insert(pos, dependent);
            }
        }
        indegree.remove(&name);
        order.push(by_name.remove(&name).expect("plugin entry"));
    }

    if !by_name.is_empty() {
        let cycle: Vec<&String> = by_name.keys().collect();
        tracing::warn!(
            plugins = ?cycle,
            "Dependency cycle between plugins, activating in name order"
        );
        order.extend(by_name.into_values());
    }

    order
}
