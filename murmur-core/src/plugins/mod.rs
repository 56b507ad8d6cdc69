//! Plugin system: discovery, activation pipeline, and dispatch

pub mod error;
pub mod host;
pub mod lifecycle;
pub mod registry;

pub use error::PluginHostError;
pub use host::{ActivationReport, PluginHost, PluginHostConfig, PluginInfo};
pub use lifecycle::{
    ActivationGateError, DiscoveredPlugin, LifecycleState, UpdateStatus, Updater,
    activation_order, check_host_compatibility, check_platform, check_required_plugins,
};
pub use registry::PluginRegistry;
