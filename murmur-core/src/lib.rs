//! murmur-core: Core library for the murmur userbot framework
//!
//! This crate provides the foundational components for murmur:
//!
//! - **Plugin system** - [`PluginHost`] discovers plugin directories,
//!   walks each plugin through the activation pipeline (update check,
//!   platform gate, host version gate, dependency gate, package
//!   requirements), and loads the surviving ones as dynamic libraries
//! - **Command dispatch** - [`Dispatcher`] routes prefixed chat messages
//!   to plugin command handlers, enforcing per-command permission lists
//! - **Argument parsing** - [`args`] tokenizes command bodies and binds
//!   them to declared, typed arguments
//! - **Chat boundary** - the [`ChatClient`] trait is the only contact
//!   point with a messaging transport
//!
//! # Quick Start
//!
//! ```no_run
//! use murmur_core::config::InstanceConfig;
//! use murmur_core::notify::NotifyStack;
//! use murmur_core::plugins::{PluginHost, PluginHostConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = InstanceConfig::default();
//! let notify = Arc::new(NotifyStack::new());
//! let mut host = PluginHost::new(PluginHostConfig::default(), config, notify);
//!
//! let report = host.activate_all().await?;
//! println!("{} plugins active", report.active_count());
//! # Ok(())
//! # }
//! ```

pub mod args;
pub mod chat;
pub mod commands;
pub mod config;
pub mod dispatch;
pub mod notify;
pub mod plugins;

// Re-export key types for convenience
pub use args::{ArgumentParseError, Invocation, Tokenizer};
pub use chat::{ChatClient, ChatError, format_notify, format_success, format_unsuccess, format_warning};
pub use commands::{
    AuthorizationResult, CommandError, CommandRegistry, RegisteredCommand, TrustOutcome,
};
pub use config::{ConfigError, HOST_VERSION, InstanceConfig};
pub use dispatch::{DispatchOutcome, Dispatcher};
pub use notify::NotifyStack;
pub use plugins::{
    ActivationReport, LifecycleState, PluginHost, PluginHostConfig, PluginHostError, PluginInfo,
    UpdateStatus,
};
