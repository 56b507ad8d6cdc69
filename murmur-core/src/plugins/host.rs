//! PluginHost - discovers plugins and drives them through activation

use libloading::Library;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use murmur_plugin_api::{
    API_VERSION, ChatMessage, CommandReply, ParsedArgs, Plugin, PluginConfig, PluginContext,
    PluginError, PluginManifest, ServiceRegistry, Version,
};

use super::error::PluginHostError;
use super::lifecycle::{
    self, DiscoveredPlugin, LifecycleState, UpdateStatus, Updater, activation_order,
};
use super::registry::PluginRegistry;
use crate::chat::{format_notify, format_warning};
use crate::commands::CommandRegistry;
use crate::config::InstanceConfig;
use crate::notify::NotifyStack;

/// A plugin that made it through activation
struct LoadedPlugin {
    manifest: PluginManifest,
    instance: Box<dyn Plugin>,
    context: PluginContext,
    /// Keep the library loaded
    _library: Library,
    state: LifecycleState,
}

impl Drop for LoadedPlugin {
    fn drop(&mut self) {
        // on_unload must run before the library is dropped so the plugin
        // can release resources that live in its own code
        if let Err(e) = self.instance.on_unload() {
            tracing::warn!(
                plugin = %self.context.plugin_name(),
                error = %e,
                "Plugin on_unload returned error"
            );
        }
    }
}

/// Configuration for PluginHost
pub struct PluginHostConfig {
    /// User plugin directory
    pub user_plugin_dir: PathBuf,
    /// Project-level plugin directory, searched first
    pub project_plugin_dir: Option<PathBuf>,
    /// Where update hashes are kept
    pub cache_dir: PathBuf,
}

impl Default for PluginHostConfig {
    fn default() -> Self {
        Self {
            user_plugin_dir: murmur_paths::data_dir().join("plugins"),
            project_plugin_dir: None,
            cache_dir: murmur_paths::cache_dir(),
        }
    }
}

/// Information about a plugin known to the host
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub name: String,
    pub version: Version,
    pub description: String,
    pub author: String,
    pub state: LifecycleState,
}

/// How activation went for each discovered plugin
#[derive(Debug, Default)]
pub struct ActivationReport {
    pub entries: Vec<(String, LifecycleState)>,
}

impl ActivationReport {
    pub fn active_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, state)| state.is_active())
            .count()
    }
}

/// The plugin host manages discovery, activation, and command dispatch
pub struct PluginHost {
    plugins: HashMap<String, LoadedPlugin>,
    /// Directories to search (project first, then user)
    plugin_dirs: Vec<PathBuf>,
    registry_path: PathBuf,
    updater: Updater,
    config: InstanceConfig,
    services: Arc<ServiceRegistry>,
    commands: CommandRegistry,
    notify: Arc<NotifyStack>,
}

impl PluginHost {
    /// Create a new plugin host
    pub fn new(
        host_config: PluginHostConfig,
        config: InstanceConfig,
        notify: Arc<NotifyStack>,
    ) -> Self {
        let mut plugin_dirs = Vec::new();
        if let Some(project_dir) = host_config.project_plugin_dir {
            plugin_dirs.push(project_dir);
        }
        plugin_dirs.push(host_config.user_plugin_dir.clone());

        let commands = CommandRegistry::new(config.owner_ids.clone());

        Self {
            plugins: HashMap::new(),
            plugin_dirs,
            registry_path: host_config.user_plugin_dir.join("registry.toml"),
            updater: Updater::new(host_config.cache_dir),
            config,
            services: Arc::new(ServiceRegistry::new()),
            commands,
            notify,
        }
    }

    /// Discover all enabled plugins and activate them in dependency
    /// order
    pub async fn activate_all(&mut self) -> Result<ActivationReport, PluginHostError> {
        let registry = PluginRegistry::load(&self.registry_path)?;
        let mut report = ActivationReport::default();

        let mut discovered = Vec::new();
        for dir in self.discover_plugin_dirs()? {
            let name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string();
            if name.is_empty() {
                continue;
            }
            if !registry.is_enabled(&name) {
                tracing::debug!(plugin = %name, "Plugin disabled, skipping");
                report.entries.push((
                    name,
                    LifecycleState::Skipped {
                        reason: "disabled".to_string(),
                    },
                ));
                continue;
            }
            let manifest = PluginManifest::load(&dir);
            discovered.push(DiscoveredPlugin {
                name,
                dir,
                manifest,
            });
        }

        // versions of plugins already activated, fed to dependency gates
        let mut active: HashMap<String, Version> = self
            .plugins
            .iter()
            .filter(|(_, p)| p.state.is_active())
            .map(|(name, p)| (name.clone(), p.manifest.version))
            .collect();

        for plugin in activation_order(discovered) {
            if self.plugins.contains_key(&plugin.name) {
                continue;
            }
            let name = plugin.name.clone();
            let state = self.activate_one(plugin, &active).await;

            match &state {
                LifecycleState::Active => {
                    let version = self.plugins[&name].manifest.version;
                    active.insert(name.clone(), version);
                    tracing::info!(plugin = %name, version = %version, "Plugin active");
                }
                LifecycleState::Skipped { reason } => {
                    tracing::info!(plugin = %name, reason = %reason, "Plugin skipped");
                }
                LifecycleState::Errored { error } => {
                    tracing::error!(plugin = %name, error = %error, "Plugin failed to activate");
                    self.notify
                        .push(format_warning(&format!("Plugin {name} failed: {error}")));
                }
            }
            report.entries.push((name, state));
        }

        Ok(report)
    }

    /// Walk one plugin through the activation gates
    async fn activate_one(
        &mut self,
        plugin: DiscoveredPlugin,
        active: &HashMap<String, Version>,
    ) -> LifecycleState {
        let mut manifest = match plugin.manifest {
            Ok(manifest) => manifest,
            Err(e) => {
                return LifecycleState::Errored {
                    error: e.to_string(),
                };
            }
        };
        let name = &plugin.name;

        if self.config.auto_update {
            let library_path = self
                .find_library(&plugin.dir, name)
                .unwrap_or_else(|_| plugin.dir.join(default_library_name(name)));
            match self
                .updater
                .update_plugin(name, &manifest, &plugin.dir, &library_path)
                .await
            {
                Ok(UpdateStatus::Updated) => {
                    // the new build may ship with a revised manifest
                    match PluginManifest::load(&plugin.dir) {
                        Ok(updated) => manifest = updated,
                        Err(e) => {
                            return LifecycleState::Errored {
                                error: e.to_string(),
                            };
                        }
                    }
                    self.notify
                        .push(format_notify(&format!("Plugin {name} has been updated")));
                    if let Some(entry) = manifest.changelog.first() {
                        self.notify.push(format_notify(entry));
                    }
                }
                Ok(_) => {}
                // an unreachable update source must not block activation
                Err(e) => {
                    tracing::warn!(plugin = %name, error = %e, "Update check failed");
                    self.notify
                        .push(format_warning(&format!("Update check for {name} failed")));
                }
            }
        }

        let gates = lifecycle::check_platform(&manifest, &self.config.platform)
            .and_then(|()| lifecycle::check_host_compatibility(&manifest))
            .and_then(|()| lifecycle::check_required_plugins(&manifest, active));
        // gate failures error the plugin; activate_all queues the
        // notification when it records the state
        if let Err(e) = gates {
            return LifecycleState::Errored {
                error: e.to_string(),
            };
        }
        if let Err(e) =
            lifecycle::install_packages(&self.config.package_installer, &manifest.packages).await
        {
            return LifecycleState::Errored {
                error: e.to_string(),
            };
        }

        match self.execute_plugin(&plugin.dir, name, manifest) {
            Ok(loaded) => {
                let state = loaded.state.clone();
                self.plugins.insert(name.clone(), loaded);
                state
            }
            Err(PluginHostError::Init(PluginError::Exited)) => LifecycleState::Skipped {
                reason: "Plugin exited".to_string(),
            },
            Err(e) => LifecycleState::Errored {
                error: e.to_string(),
            },
        }
    }

    /// Load the plugin library, construct the instance, and run
    /// `on_load`
    fn execute_plugin(
        &mut self,
        dir: &Path,
        name: &str,
        manifest: PluginManifest,
    ) -> Result<LoadedPlugin, PluginHostError> {
        let lib_path = self.find_library(dir, name)?;

        // SAFETY: the user enabled this plugin; it is expected to follow
        // the Plugin trait contract.
        let library = unsafe { Library::new(&lib_path)? };

        // SAFETY: calling a C function exported by the plugin.
        let api_version_fn: libloading::Symbol<extern "C" fn() -> u32> =
            unsafe { library.get(b"_murmur_plugin_api_version")? };
        let plugin_api_version = api_version_fn();
        if plugin_api_version != API_VERSION {
            return Err(PluginHostError::ApiVersionMismatch {
                expected: API_VERSION,
                found: plugin_api_version,
            });
        }

        // SAFETY: the create function returns a raw pointer we own and
        // convert back to a Box<dyn Plugin>.
        let create_fn: libloading::Symbol<extern "C" fn() -> *mut dyn Plugin> =
            unsafe { library.get(b"_murmur_plugin_create")? };
        let mut instance = unsafe { Box::from_raw(create_fn()) };

        let config = PluginConfig::load(&dir.join("config.toml")).unwrap_or_default();
        let mut context = PluginContext::with_config(
            name.to_string(),
            dir.to_path_buf(),
            self.services.clone(),
            config,
        );

        let load_result =
            std::panic::catch_unwind(AssertUnwindSafe(|| instance.on_load(&mut context)));
        match load_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(PluginHostError::Init(e)),
            Err(_) => {
                return Err(PluginHostError::Init(PluginError::custom(
                    "Plugin panicked in on_load",
                )));
            }
        }

        // commit command registrations, rolling back on any conflict
        for spec in context.take_pending_commands() {
            if let Err(e) = self.commands.register(name, spec) {
                self.commands.unregister_plugin(name);
                return Err(match e {
                    crate::commands::CommandError::AliasConflict { alias, owner } => {
                        PluginHostError::CommandConflict {
                            alias,
                            existing_plugin: owner,
                            new_plugin: name.to_string(),
                        }
                    }
                    other => PluginHostError::Registry(other.to_string()),
                });
            }
        }

        Ok(LoadedPlugin {
            manifest,
            instance,
            context,
            _library: library,
            state: LifecycleState::Active,
        })
    }

    /// Run an explicit update pass over every enabled plugin without
    /// activating anything
    pub async fn update_all(&mut self) -> Result<Vec<(String, UpdateStatus)>, PluginHostError> {
        let registry = PluginRegistry::load(&self.registry_path)?;
        let mut results = Vec::new();

        for dir in self.discover_plugin_dirs()? {
            let name = dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("")
                .to_string();
            if name.is_empty() || !registry.is_enabled(&name) {
                continue;
            }
            let manifest = match PluginManifest::load(&dir) {
                Ok(manifest) => manifest,
                Err(e) => {
                    tracing::warn!(plugin = %name, error = %e, "Skipping update, bad manifest");
                    continue;
                }
            };
            let library_path = self
                .find_library(&dir, &name)
                .unwrap_or_else(|_| dir.join(default_library_name(&name)));
            // one unreachable update source must not abort the rest
            let status = match self
                .updater
                .update_plugin(&name, &manifest, &dir, &library_path)
                .await
            {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(plugin = %name, error = %e, "Update failed");
                    continue;
                }
            };
            results.push((name, status));
        }

        Ok(results)
    }

    /// Discover plugin directories, project dirs shadowing user dirs of
    /// the same name
    fn discover_plugin_dirs(&self) -> Result<Vec<PathBuf>, PluginHostError> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();

        for base_dir in &self.plugin_dirs {
            if !base_dir.exists() {
                tracing::debug!(dir = %base_dir.display(), "Plugin directory does not exist");
                continue;
            }

            for entry in std::fs::read_dir(base_dir)? {
                let entry = entry?;
                let path = entry.path();
                let name = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .unwrap_or("")
                    .to_string();
                if path.is_dir() && seen.insert(name) {
                    found.push(path);
                }
            }
        }

        Ok(found)
    }

    /// Find the library file in a plugin directory
    fn find_library(&self, dir: &Path, name: &str) -> Result<PathBuf, PluginHostError> {
        let extensions = if cfg!(target_os = "macos") {
            vec!["dylib", "so"]
        } else if cfg!(target_os = "windows") {
            vec!["dll"]
        } else {
            vec!["so"]
        };

        for ext in extensions {
            let lib_path = dir.join(format!("{name}.{ext}"));
            if lib_path.exists() {
                return Ok(lib_path);
            }

            let lib_path = dir.join(format!("lib{name}.{ext}"));
            if lib_path.exists() {
                return Ok(lib_path);
            }
        }

        Err(PluginHostError::LibraryNotFound {
            dir: dir.to_path_buf(),
        })
    }

    /// Unload a plugin and clean up its command registrations
    pub fn unload_plugin(&mut self, name: &str) -> Result<(), PluginHostError> {
        if self.plugins.remove(name).is_none() {
            return Err(PluginHostError::NotFound {
                name: name.to_string(),
            });
        }
        self.commands.unregister_plugin(name);
        Ok(())
    }

    /// Hand a parsed invocation to the plugin that registered the
    /// command.
    ///
    /// Runs with panic isolation; a panicking plugin is marked errored
    /// and its commands are removed.
    pub fn dispatch_command(
        &mut self,
        plugin_name: &str,
        path: &[String],
        args: &ParsedArgs,
        event: &ChatMessage,
    ) -> Result<CommandReply, PluginHostError> {
        let plugin =
            self.plugins
                .get_mut(plugin_name)
                .ok_or_else(|| PluginHostError::NotFound {
                    name: plugin_name.to_string(),
                })?;
        if !plugin.state.is_active() {
            return Err(PluginHostError::NotFound {
                name: plugin_name.to_string(),
            });
        }

        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            plugin
                .instance
                .handle_command(path, args, event, &mut plugin.context)
        }));

        match result {
            Ok(reply) => reply.map_err(PluginHostError::Init),
            Err(_) => {
                tracing::error!(plugin = %plugin_name, "Plugin panicked in handle_command, disabling");
                plugin.state = LifecycleState::Errored {
                    error: "Plugin panicked in handle_command".to_string(),
                };
                self.commands.unregister_plugin(plugin_name);
                Err(PluginHostError::Init(PluginError::custom(
                    "Plugin panicked in handle_command",
                )))
            }
        }
    }

    /// Enable a plugin in the registry
    pub fn enable_plugin(&mut self, name: &str) -> Result<(), PluginHostError> {
        let mut registry = PluginRegistry::load(&self.registry_path)?;
        registry.enable(name);
        registry.save(&self.registry_path)?;
        Ok(())
    }

    /// Disable a plugin, unloading it if it is active
    pub fn disable_plugin(&mut self, name: &str) -> Result<(), PluginHostError> {
        let mut registry = PluginRegistry::load(&self.registry_path)?;
        registry.disable(name);
        registry.save(&self.registry_path)?;

        if self.plugins.contains_key(name) {
            self.unload_plugin(name)?;
        }
        Ok(())
    }

    /// List all loaded plugins
    pub fn list_plugins(&self) -> Vec<PluginInfo> {
        let mut plugins: Vec<PluginInfo> = self
            .plugins
            .iter()
            .map(|(name, p)| PluginInfo {
                name: name.clone(),
                version: p.manifest.version,
                description: p.manifest.description.clone(),
                author: p.manifest.author.clone(),
                state: p.state.clone(),
            })
            .collect();
        plugins.sort_by(|a, b| a.name.cmp(&b.name));
        plugins
    }

    /// Get information about a specific plugin
    pub fn plugin_info(&self, name: &str) -> Option<PluginInfo> {
        self.plugins.get(name).map(|p| PluginInfo {
            name: name.to_string(),
            version: p.manifest.version,
            description: p.manifest.description.clone(),
            author: p.manifest.author.clone(),
            state: p.state.clone(),
        })
    }

    /// Number of loaded plugins
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Read access to the command registry
    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    /// Mutable access to the command registry (trust changes,
    /// permission persistence)
    pub fn commands_mut(&mut self) -> &mut CommandRegistry {
        &mut self.commands
    }

    /// The service registry shared by all plugins
    pub fn services(&self) -> &Arc<ServiceRegistry> {
        &self.services
    }
}

/// Platform-default library file name for a plugin
fn default_library_name(name: &str) -> String {
    if cfg!(target_os = "windows") {
        format!("{name}.dll")
    } else if cfg!(target_os = "macos") {
        format!("lib{name}.dylib")
    } else {
        format!("lib{name}.so")
    }
}
