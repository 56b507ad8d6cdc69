//! Error types for plugin authors

use thiserror::Error;

/// Errors that plugins can return
#[derive(Error, Debug)]
pub enum PluginError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Command execution failed
    #[error("Command failed: {0}")]
    Command(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Custom error with message
    #[error("{0}")]
    Custom(String),

    /// Duplicate command registration within one plugin
    #[error("Duplicate command alias: {0}")]
    DuplicateCommand(String),

    /// Unknown command dispatch
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Deliberate clean exit during `on_load`.
    ///
    /// A plugin returns this when it detects it is inapplicable to the
    /// current configuration (for example a GUI-only plugin in a headless
    /// host). The host treats it as silent success-without-activation,
    /// not as a failure.
    #[error("Plugin exited")]
    Exited,
}

impl PluginError {
    /// Create a custom error with a message
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a command error
    pub fn command(message: impl Into<String>) -> Self {
        Self::Command(message.into())
    }
}
