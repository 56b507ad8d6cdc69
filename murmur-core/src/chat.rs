//! Chat transport boundary and outgoing message formatting
//!
//! The framework never talks to a messaging network directly; everything
//! flows through the [`ChatClient`] trait. The CLI ships a loopback
//! implementation, real deployments plug in their own transport.

use async_trait::async_trait;
use murmur_plugin_api::ChatMessage;
use std::path::Path;
use thiserror::Error;

/// Transport errors
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Send failed: {0}")]
    Send(String),

    #[error("History unavailable: {0}")]
    History(String),

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Transport disconnected")]
    Disconnected,
}

/// The chat transport the framework runs on top of
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a text message to a chat
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChatError>;

    /// Fetch up to `limit` most recent messages from a chat, newest
    /// first. Used to resolve replied-to messages the transport did not
    /// deliver inline.
    async fn recent_messages(&self, chat_id: i64, limit: usize)
    -> Result<Vec<ChatMessage>, ChatError>;

    /// Download media attached to a message into `dest`
    async fn download_media(&self, message: &ChatMessage, dest: &Path) -> Result<(), ChatError>;

    /// Shut the transport down
    async fn disconnect(&self) -> Result<(), ChatError>;
}

// ─── Outgoing message formatting ─────────────────────────────────────

/// Format a message as a notification
pub fn format_notify(message: &str) -> String {
    format!("`murmur` 🔔  {message}")
}

/// Format a message as a successful action
pub fn format_success(message: &str) -> String {
    format!("`murmur` ✅ {message}")
}

/// Format a message as an unsuccessful action
pub fn format_unsuccess(message: &str) -> String {
    format!("`murmur` ❌ {message}")
}

/// Format a message as a warning
pub fn format_warning(message: &str) -> String {
    format!("`murmur` ⚠️ {message}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatters_tag_the_instance() {
        assert_eq!(format_success("done"), "`murmur` ✅ done");
        assert_eq!(format_unsuccess("nope"), "`murmur` ❌ nope");
        assert_eq!(format_warning("careful"), "`murmur` ⚠️ careful");
        assert!(format_notify("ping").contains("🔔"));
    }
}
