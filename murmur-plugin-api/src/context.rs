//! PluginContext - a plugin's interface to host capabilities

use crate::command::CommandSpec;
use crate::error::PluginError;
use serde::{Serialize, de::DeserializeOwned};
use std::any::Any;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// Typed key-to-service map shared by all plugins.
///
/// This replaces ambient attribute injection into a global namespace:
/// a plugin that wants to expose functionality to other plugins
/// registers it under a name, and consumers query by name and type.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<dyn Any + Send + Sync>>>,
}

impl ServiceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service under a name, replacing any previous entry
    pub fn register<T: Any + Send + Sync>(&self, name: &str, service: Arc<T>) {
        let mut services = self.services.write().expect("service registry poisoned");
        services.insert(name.to_string(), service);
    }

    /// Look up a service by name and downcast it to `T`
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let services = self.services.read().expect("service registry poisoned");
        services.get(name).cloned()?.downcast::<T>().ok()
    }

    /// True when a service of that name exists
    pub fn contains(&self, name: &str) -> bool {
        let services = self.services.read().expect("service registry poisoned");
        services.contains_key(name)
    }
}

/// Plugin's interface to the host.
///
/// Passed to the plugin during lifecycle calls; provides command
/// registration, the shared service registry, a persistent per-plugin
/// key-value config, and logging.
pub struct PluginContext {
    plugin_name: String,
    plugin_dir: PathBuf,
    config: PluginConfig,
    pending_commands: Vec<CommandSpec>,
    services: Arc<ServiceRegistry>,
}

impl PluginContext {
    /// Create a context for a plugin
    pub fn new(plugin_name: String, plugin_dir: PathBuf, services: Arc<ServiceRegistry>) -> Self {
        Self {
            plugin_name,
            plugin_dir,
            config: PluginConfig::new(),
            pending_commands: Vec::new(),
            services,
        }
    }

    /// Create a context with a pre-loaded config
    pub fn with_config(
        plugin_name: String,
        plugin_dir: PathBuf,
        services: Arc<ServiceRegistry>,
        config: PluginConfig,
    ) -> Self {
        Self {
            plugin_name,
            plugin_dir,
            config,
            pending_commands: Vec::new(),
            services,
        }
    }

    /// The plugin's name
    pub fn plugin_name(&self) -> &str {
        &self.plugin_name
    }

    /// The plugin's directory (for storing data files)
    pub fn plugin_dir(&self) -> &Path {
        &self.plugin_dir
    }

    // ─── Command registration ────────────────────────────────────────

    /// Register a chat command.
    ///
    /// Commands are committed by the host once `on_load` returns; a
    /// duplicate alias within the same plugin is rejected here, while
    /// collisions across plugins are rejected by the host.
    pub fn register_command(&mut self, spec: CommandSpec) -> Result<(), PluginError> {
        for alias in &spec.aliases {
            if self
                .pending_commands
                .iter()
                .any(|c| c.aliases.contains(alias))
            {
                return Err(PluginError::DuplicateCommand(alias.clone()));
            }
        }
        self.pending_commands.push(spec);
        Ok(())
    }

    /// Commands pending registration (used by the host)
    pub fn pending_commands(&self) -> &[CommandSpec] {
        &self.pending_commands
    }

    /// Take pending commands (used by the host after validation)
    pub fn take_pending_commands(&mut self) -> Vec<CommandSpec> {
        std::mem::take(&mut self.pending_commands)
    }

    // ─── Services ────────────────────────────────────────────────────

    /// Register a service other plugins can look up
    pub fn register_service<T: Any + Send + Sync>(&self, name: &str, service: Arc<T>) {
        self.services.register(name, service);
    }

    /// Look up a service registered by any plugin
    pub fn get_service<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.services.get(name)
    }

    // ─── Configuration ───────────────────────────────────────────────

    /// Read a configuration value
    pub fn config_get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.config.get(key)
    }

    /// Write a configuration value
    pub fn config_set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), PluginError> {
        self.config.set(key, value)
    }

    /// Mutable access to the config (used by the host to persist it)
    pub fn config_mut(&mut self) -> &mut PluginConfig {
        &mut self.config
    }

    // ─── Logging ─────────────────────────────────────────────────────

    /// Log an info message (automatically tagged with the plugin name)
    pub fn log_info(&self, message: &str) {
        tracing::info!(plugin = %self.plugin_name, "{}", message);
    }

    /// Log a warning message
    pub fn log_warn(&self, message: &str) {
        tracing::warn!(plugin = %self.plugin_name, "{}", message);
    }

    /// Log an error message
    pub fn log_error(&self, message: &str) {
        tracing::error!(plugin = %self.plugin_name, "{}", message);
    }

    /// Log a debug message
    pub fn log_debug(&self, message: &str) {
        tracing::debug!(plugin = %self.plugin_name, "{}", message);
    }
}

/// Plugin configuration - persistent key-value store backed by TOML
pub struct PluginConfig {
    values: HashMap<String, toml::Value>,
    dirty: bool,
}

impl PluginConfig {
    /// Create a new empty config
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
            dirty: false,
        }
    }

    /// Load configuration from a TOML file; missing file means empty
    pub fn load(path: &Path) -> Result<Self, PluginError> {
        if !path.exists() {
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        let values: HashMap<String, toml::Value> =
            toml::from_str(&content).map_err(|e| PluginError::Config(e.to_string()))?;
        Ok(Self {
            values,
            dirty: false,
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&mut self, path: &Path) -> Result<(), PluginError> {
        let content = toml::to_string_pretty(&self.values)
            .map_err(|e| PluginError::Serialization(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        self.dirty = false;
        Ok(())
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values.get(key).and_then(|v| v.clone().try_into().ok())
    }

    /// Set a configuration value
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), PluginError> {
        let toml_value =
            toml::Value::try_from(value).map_err(|e| PluginError::Serialization(e.to_string()))?;
        self.values.insert(key.to_string(), toml_value);
        self.dirty = true;
        Ok(())
    }

    /// Check if the config has been modified since loading/saving
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandSpec;
    use tempfile::TempDir;

    fn ctx() -> PluginContext {
        PluginContext::new(
            "test".into(),
            PathBuf::from("/tmp/test"),
            Arc::new(ServiceRegistry::new()),
        )
    }

    #[test]
    fn test_context_creation() {
        let ctx = ctx();
        assert_eq!(ctx.plugin_name(), "test");
        assert_eq!(ctx.plugin_dir(), Path::new("/tmp/test"));
        assert!(ctx.pending_commands().is_empty());
    }

    #[test]
    fn test_register_command() {
        let mut ctx = ctx();
        ctx.register_command(CommandSpec::new("echo", "Echo text"))
            .unwrap();
        assert_eq!(ctx.pending_commands().len(), 1);
    }

    #[test]
    fn test_register_command_duplicate_alias_fails() {
        let mut ctx = ctx();
        ctx.register_command(CommandSpec::new("echo", "Echo text"))
            .unwrap();
        let result = ctx.register_command(CommandSpec::new("say", "Say").alias("echo"));
        assert!(matches!(result, Err(PluginError::DuplicateCommand(_))));
    }

    #[test]
    fn test_take_pending_commands() {
        let mut ctx = ctx();
        ctx.register_command(CommandSpec::new("ping", "Ping"))
            .unwrap();

        let commands = ctx.take_pending_commands();
        assert_eq!(commands.len(), 1);
        assert!(ctx.pending_commands().is_empty());
    }

    #[test]
    fn test_service_registry_roundtrip() {
        let services = Arc::new(ServiceRegistry::new());
        services.register("counter", Arc::new(7u64));

        assert!(services.contains("counter"));
        assert_eq!(services.get::<u64>("counter").as_deref(), Some(&7));
        // wrong type downcasts to None
        assert!(services.get::<String>("counter").is_none());
        assert!(services.get::<u64>("missing").is_none());
    }

    #[test]
    fn test_services_shared_across_contexts() {
        let services = Arc::new(ServiceRegistry::new());
        let producer = PluginContext::new("a".into(), "/tmp/a".into(), services.clone());
        let consumer = PluginContext::new("b".into(), "/tmp/b".into(), services);

        producer.register_service("greeting", Arc::new("hello".to_string()));
        assert_eq!(
            consumer.get_service::<String>("greeting").as_deref(),
            Some(&"hello".to_string())
        );
    }

    #[test]
    fn test_config_get_set() {
        let mut config = PluginConfig::new();

        config.set("string_key", "hello").unwrap();
        config.set("int_key", 42i64).unwrap();

        assert_eq!(
            config.get::<String>("string_key"),
            Some("hello".to_string())
        );
        assert_eq!(config.get::<i64>("int_key"), Some(42));
        assert_eq!(config.get::<String>("missing"), None);
    }

    #[test]
    fn test_config_save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");

        let mut config = PluginConfig::new();
        config.set("name", "test-plugin").unwrap();
        config.save(&config_path).unwrap();
        assert!(!config.is_dirty());

        let loaded = PluginConfig::load(&config_path).unwrap();
        assert_eq!(
            loaded.get::<String>("name"),
            Some("test-plugin".to_string())
        );
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = PluginConfig::load(Path::new("/nonexistent/path/config.toml")).unwrap();
        assert!(config.values.is_empty());
    }
}
