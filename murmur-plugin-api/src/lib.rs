//! murmur-plugin-api - Plugin API for the murmur userbot framework
//!
//! This crate provides the traits and types needed to write plugins for
//! murmur. Plugins are native Rust dynamic libraries that register chat
//! commands, handle their invocations, and share services with other
//! plugins. Each plugin ships alongside a `manifest.toml` describing its
//! version, platform support, and dependencies; the host reads that file
//! before the library is ever loaded.
//!
//! # Example
//!
//! ```ignore
//! use murmur_plugin_api::{
//!     ChatMessage, CommandReply, CommandSpec, ParsedArgs, Plugin, PluginContext,
//!     PluginError, export_plugin,
//! };
//!
//! #[derive(Default)]
//! pub struct MyPlugin;
//!
//! impl Plugin for MyPlugin {
//!     fn on_load(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError> {
//!         ctx.register_command(CommandSpec::new("hello", "Say hello"))?;
//!         Ok(())
//!     }
//!
//!     fn handle_command(
//!         &mut self,
//!         path: &[String],
//!         _args: &ParsedArgs,
//!         _event: &ChatMessage,
//!         _ctx: &mut PluginContext,
//!     ) -> Result<CommandReply, PluginError> {
//!         match path[0].as_str() {
//!             "hello" => Ok(CommandReply::Text("hello!".into())),
//!             other => Err(PluginError::UnknownCommand(other.into())),
//!         }
//!     }
//! }
//!
//! export_plugin!(MyPlugin);
//! ```

pub mod command;
pub mod context;
pub mod error;
pub mod event;
pub mod manifest;
pub mod version;

pub use command::{
    ArgKind, ArgSpec, ArgValue, BoolLiterals, CommandReply, CommandSpec, ParsedArgs,
};
pub use context::{PluginConfig, PluginContext, ServiceRegistry};
pub use error::PluginError;
pub use event::ChatMessage;
pub use manifest::{
    MANIFEST_FILE, ManifestError, PluginManifest, PluginRequirement, ResourceLink,
};
pub use version::{CompareOp, Version, VersionPart, compare_versions};

/// Current plugin API version. Plugins must match this exactly.
/// This is checked before the plugin instance is constructed.
pub const API_VERSION: u32 = 1;

/// The core plugin trait - implement this to create a murmur plugin.
///
/// `on_load` runs once at activation; commands registered through the
/// context there are committed by the host when it returns. Returning
/// [`PluginError::Exited`] from `on_load` is not a failure: it means the
/// plugin decided at startup it has nothing to do, and the host skips it
/// without marking it errored.
pub trait Plugin: Send + Sync {
    /// Called when the plugin is activated. Register commands and
    /// services here.
    fn on_load(&mut self, ctx: &mut PluginContext) -> Result<(), PluginError>;

    /// Called when the plugin is unloaded. Use this to clean up resources.
    fn on_unload(&mut self) -> Result<(), PluginError> {
        Ok(())
    }

    /// Called when one of the plugin's commands is invoked and the
    /// invocation passed parsing and permission checks.
    ///
    /// `path` is the matched command path (primary alias, then any
    /// sub-command names).
    fn handle_command(
        &mut self,
        path: &[String],
        _args: &ParsedArgs,
        _event: &ChatMessage,
        _ctx: &mut PluginContext,
    ) -> Result<CommandReply, PluginError> {
        Err(PluginError::UnknownCommand(path.join(" ")))
    }
}

/// Export a plugin type for dynamic loading.
///
/// This macro generates the C ABI entry points murmur uses to load and
/// unload plugins dynamically.
///
/// # Usage
///
/// ```ignore
/// murmur_plugin_api::export_plugin!(MyPlugin);
/// ```
///
/// # Generated Functions
///
/// - `_murmur_plugin_create()`: Creates a new plugin instance
/// - `_murmur_plugin_api_version()`: Returns the API version
/// - `_murmur_plugin_destroy()`: Destroys a plugin instance
#[macro_export]
macro_rules! export_plugin {
    ($plugin_type:ty) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _murmur_plugin_create() -> *mut dyn $crate::Plugin {
            let plugin: Box<dyn $crate::Plugin> = Box::new(<$plugin_type>::default());
            Box::into_raw(plugin)
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _murmur_plugin_api_version() -> u32 {
            $crate::API_VERSION
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn _murmur_plugin_destroy(ptr: *mut dyn $crate::Plugin) {
            if !ptr.is_null() {
                unsafe {
                    drop(Box::from_raw(ptr));
                }
            }
        }
    };
}
