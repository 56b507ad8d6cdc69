//! Command registry and permission lists
//!
//! Every registered command node carries a permission list: the set of
//! user ids allowed to invoke it. Owners are pre-populated into every
//! list at registration and can extend a list at runtime by trusting a
//! user. Denied invocations are dropped without any reply; answering
//! would leak the instance's presence to untrusted users in shared
//! chats.

use murmur_plugin_api::CommandSpec;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Registration errors
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("Alias {alias:?} is already registered by plugin {owner:?}")]
    AliasConflict { alias: String, owner: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid permission file: {0}")]
    InvalidPermissions(String),
}

/// Outcome of a permission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationResult {
    Granted,
    /// Dropped silently, never answered
    Denied,
}

/// Outcome of a trust/distrust request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrustOutcome {
    /// The user was added to (or removed from) the list
    Changed,
    /// The list already had (or didn't have) the user
    Unchanged,
    /// Danger commands can never be opened up
    RefusedDanger,
    /// No command node under that name
    UnknownCommand,
}

/// A command as registered by a plugin
#[derive(Debug)]
pub struct RegisteredCommand {
    /// Plugin that owns the command
    pub plugin: String,
    /// The declared spec, sub-commands included
    pub spec: CommandSpec,
}

/// Alias-to-command map plus per-node permission lists
pub struct CommandRegistry {
    aliases: HashMap<String, Arc<RegisteredCommand>>,
    /// permission key -> allowed user ids
    permissions: HashMap<String, BTreeSet<u64>>,
    /// key -> the node is flagged danger
    danger_keys: BTreeSet<String>,
    owner_ids: BTreeSet<u64>,
}

impl CommandRegistry {
    pub fn new(owner_ids: BTreeSet<u64>) -> Self {
        Self {
            aliases: HashMap::new(),
            permissions: HashMap::new(),
            danger_keys: BTreeSet::new(),
            owner_ids,
        }
    }

    /// Register a command tree for a plugin.
    ///
    /// Rejects the whole spec if any top-level alias is already taken.
    /// Every node (the command and each sub-command, recursively) gets
    /// its own permission list, pre-populated with the owners.
    pub fn register(&mut self, plugin: &str, spec: CommandSpec) -> Result<(), CommandError> {
        for alias in &spec.aliases {
            if let Some(existing) = self.aliases.get(alias) {
                return Err(CommandError::AliasConflict {
                    alias: alias.clone(),
                    owner: existing.plugin.clone(),
                });
            }
        }

        self.seed_permissions(&spec);

        let command = Arc::new(RegisteredCommand {
            plugin: plugin.to_string(),
            spec,
        });
        for alias in &command.spec.aliases {
            self.aliases.insert(alias.clone(), command.clone());
        }
        Ok(())
    }

    fn seed_permissions(&mut self, spec: &CommandSpec) {
        let key = spec.effective_permission_key().to_string();
        self.permissions
            .entry(key.clone())
            .or_default()
            .extend(self.owner_ids.iter().copied());
        if spec.danger {
            self.danger_keys.insert(key);
        }
        for sub in &spec.subcommands {
            self.seed_permissions(sub);
        }
    }

    /// Remove every command a plugin registered, with its permission
    /// lists
    pub fn unregister_plugin(&mut self, plugin: &str) {
        let removed: Vec<Arc<RegisteredCommand>> = self
            .aliases
            .values()
            .filter(|c| c.plugin == plugin)
            .cloned()
            .collect();
        self.aliases.retain(|_, c| c.plugin != plugin);
        for command in removed {
            self.drop_permissions(&command.spec);
        }
    }

    fn drop_permissions(&mut self, spec: &CommandSpec) {
        let key = spec.effective_permission_key();
        self.permissions.remove(key);
        self.danger_keys.remove(key);
        for sub in &spec.subcommands {
            self.drop_permissions(sub);
        }
    }

    /// Resolve an alias to its command
    pub fn resolve(&self, alias: &str) -> Option<&Arc<RegisteredCommand>> {
        self.aliases.get(alias)
    }

    /// All registered commands, deduplicated, sorted by primary alias
    pub fn commands(&self) -> Vec<&Arc<RegisteredCommand>> {
        let mut seen = BTreeSet::new();
        let mut commands: Vec<_> = self
            .aliases
            .values()
            .filter(|c| seen.insert(c.spec.primary_alias().to_string()))
            .collect();
        commands.sort_by_key(|c| c.spec.primary_alias().to_string());
        commands
    }

    /// Check whether a user may invoke the node behind `key`
    pub fn authorize(&self, key: &str, user_id: u64) -> AuthorizationResult {
        if self.owner_ids.contains(&user_id) {
            return AuthorizationResult::Granted;
        }
        match self.permissions.get(key) {
            Some(allowed) if allowed.contains(&user_id) => AuthorizationResult::Granted,
            _ => AuthorizationResult::Denied,
        }
    }

    /// Allow a user to invoke the command behind `alias`
    pub fn trust(&mut self, alias: &str, user_id: u64) -> TrustOutcome {
        let Some(command) = self.aliases.get(alias) else {
            return TrustOutcome::UnknownCommand;
        };
        let key = command.spec.effective_permission_key().to_string();
        if self.danger_keys.contains(&key) {
            return TrustOutcome::RefusedDanger;
        }
        let allowed = self.permissions.entry(key).or_default();
        if allowed.insert(user_id) {
            TrustOutcome::Changed
        } else {
            TrustOutcome::Unchanged
        }
    }

    /// Revoke a user's access to the command behind `alias`. Owners
    /// cannot be distrusted.
    pub fn distrust(&mut self, alias: &str, user_id: u64) -> TrustOutcome {
        let Some(command) = self.aliases.get(alias) else {
            return TrustOutcome::UnknownCommand;
        };
        if self.owner_ids.contains(&user_id) {
            return TrustOutcome::Unchanged;
        }
        let key = command.spec.effective_permission_key();
        match self.permissions.get_mut(key) {
            Some(allowed) => {
                if allowed.remove(&user_id) {
                    TrustOutcome::Changed
                } else {
                    TrustOutcome::Unchanged
                }
            }
            None => TrustOutcome::Unchanged,
        }
    }

    /// Users allowed on a permission key, owners included
    pub fn allowed_users(&self, key: &str) -> Option<&BTreeSet<u64>> {
        self.permissions.get(key)
    }

    // ─── Persistence ─────────────────────────────────────────────────

    /// Load persisted permission lists, merging on top of the seeded
    /// ones so restarts keep trusted users
    pub fn load_permissions(&mut self, path: &Path) -> Result<(), CommandError> {
        if !path.exists() {
            return Ok(());
        }
        let content = std::fs::read_to_string(path)?;
        let stored: HashMap<String, BTreeSet<u64>> = toml::from_str(&content)
            .map_err(|e| CommandError::InvalidPermissions(e.to_string()))?;
        for (key, users) in stored {
            self.permissions.entry(key).or_default().extend(users);
        }
        Ok(())
    }

    /// Persist the permission lists
    pub fn save_permissions(&self, path: &Path) -> Result<(), CommandError> {
        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(&self.permissions)
            .map_err(|e| CommandError::InvalidPermissions(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn registry() -> CommandRegistry {
        CommandRegistry::new(BTreeSet::from([1]))
    }

    #[test]
    fn test_owner_is_always_authorized() {
        let mut reg = registry();
        reg.register("essentials", CommandSpec::new("echo", "Echo"))
            .unwrap();

        assert_eq!(reg.authorize("echo", 1), AuthorizationResult::Granted);
        assert_eq!(reg.authorize("echo", 2), AuthorizationResult::Denied);
    }

    #[test]
    fn test_alias_conflict_names_the_owner() {
        let mut reg = registry();
        reg.register("first", CommandSpec::new("echo", "Echo"))
            .unwrap();
        let err = reg
            .register("second", CommandSpec::new("say", "Say").alias("echo"))
            .unwrap_err();
        match err {
            CommandError::AliasConflict { alias, owner } => {
                assert_eq!(alias, "echo");
                assert_eq!(owner, "first");
            }
            other => panic!("expected AliasConflict, got {other:?}"),
        }
    }

    #[test]
    fn test_trust_grants_access() {
        let mut reg = registry();
        reg.register("essentials", CommandSpec::new("echo", "Echo"))
            .unwrap();

        assert_eq!(reg.authorize("echo", 2), AuthorizationResult::Denied);
        assert_eq!(reg.trust("echo", 2), TrustOutcome::Changed);
        assert_eq!(reg.trust("echo", 2), TrustOutcome::Unchanged);
        assert_eq!(reg.authorize("echo", 2), AuthorizationResult::Granted);

        assert_eq!(reg.distrust("echo", 2), TrustOutcome::Changed);
        assert_eq!(reg.authorize("echo", 2), AuthorizationResult::Denied);
        // removing a user who was never trusted changes nothing
        assert_eq!(reg.distrust("echo", 3), TrustOutcome::Unchanged);
    }

    #[test]
    fn test_danger_command_refuses_trust() {
        let mut reg = registry();
        reg.register("essentials", CommandSpec::new("exec", "Run code").danger())
            .unwrap();

        assert_eq!(reg.trust("exec", 2), TrustOutcome::RefusedDanger);
        assert_eq!(reg.authorize("exec", 2), AuthorizationResult::Denied);
        // the owner still may
        assert_eq!(reg.authorize("exec", 1), AuthorizationResult::Granted);
    }

    #[test]
    fn test_trust_unknown_command() {
        let mut reg = registry();
        assert_eq!(reg.trust("ghost", 2), TrustOutcome::UnknownCommand);
    }

    #[test]
    fn test_subcommand_nodes_get_own_permission_lists() {
        let mut reg = registry();
        reg.register(
            "essentials",
            CommandSpec::new("perm", "Permissions")
                .subcommand(CommandSpec::new("add", "Add").permission_key("perm.add")),
        )
        .unwrap();

        assert!(reg.allowed_users("perm").unwrap().contains(&1));
        assert!(reg.allowed_users("perm.add").unwrap().contains(&1));
    }

    #[test]
    fn test_unregister_plugin_removes_everything() {
        let mut reg = registry();
        reg.register("essentials", CommandSpec::new("echo", "Echo").alias("e"))
            .unwrap();
        reg.unregister_plugin("essentials");

        assert!(reg.resolve("echo").is_none());
        assert!(reg.resolve("e").is_none());
        assert!(reg.allowed_users("echo").is_none());
    }

    #[test]
    fn test_permissions_survive_save_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("permissions.toml");

        let mut reg = registry();
        reg.register("essentials", CommandSpec::new("echo", "Echo"))
            .unwrap();
        reg.trust("echo", 2);
        reg.save_permissions(&path).unwrap();

        let mut fresh = registry();
        fresh
            .register("essentials", CommandSpec::new("echo", "Echo"))
            .unwrap();
        fresh.load_permissions(&path).unwrap();
        assert_eq!(fresh.authorize("echo", 2), AuthorizationResult::Granted);
    }

    #[test]
    fn test_commands_listing_deduplicates_aliases() {
        let mut reg = registry();
        reg.register("essentials", CommandSpec::new("echo", "Echo").alias("e"))
            .unwrap();
        reg.register("essentials", CommandSpec::new("calc", "Calc"))
            .unwrap();

        let names: Vec<&str> = reg
            .commands()
            .iter()
            .map(|c| c.spec.primary_alias())
            .collect();
        assert_eq!(names, vec!["calc", "echo"]);
    }
}
