//! Message dispatch: from incoming chat message to plugin command
//!
//! Every incoming message is checked against the configured prefixes.
//! On a match the pending notification stack is flushed into the chat,
//! then the second word is resolved against the command registry, the
//! body is parsed, permissions are checked, and the owning plugin's
//! handler runs. Permission denials are dropped without any reply so the
//! instance stays invisible to untrusted users.

use crate::args::{ArgumentParseError, Tokenizer, parse_invocation};
use crate::chat::{ChatClient, ChatError, format_notify, format_success, format_unsuccess};
use crate::commands::{AuthorizationResult, TrustOutcome};
use crate::config::InstanceConfig;
use crate::notify::NotifyStack;
use crate::plugins::PluginHost;
use murmur_plugin_api::{ChatMessage, CommandReply, CommandSpec};
use std::collections::BTreeSet;
use std::sync::Arc;

/// What the dispatcher did with a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// No configured prefix matched; not for us
    NotACommand,
    /// Prefix matched but no such command is registered; stays silent
    UnknownCommand,
    /// Sender is not allowed; dropped silently
    Denied,
    /// The body did not bind to the command's arguments
    ParseFailed,
    /// The command ran
    Completed,
}

/// Routes chat messages to plugin command handlers
pub struct Dispatcher {
    host: PluginHost,
    client: Arc<dyn ChatClient>,
    notify: Arc<NotifyStack>,
    tokenizer: Tokenizer,
    prefixes: Vec<String>,
    owner_ids: BTreeSet<u64>,
    history_lookback: usize,
}

impl Dispatcher {
    pub fn new(
        host: PluginHost,
        client: Arc<dyn ChatClient>,
        notify: Arc<NotifyStack>,
        config: &InstanceConfig,
    ) -> Self {
        Self {
            host,
            client,
            notify,
            tokenizer: Tokenizer::new(config.token_cache_size),
            prefixes: config.prefixes.clone(),
            owner_ids: config.owner_ids.clone(),
            history_lookback: config.history_lookback,
        }
    }

    /// Access to the plugin host
    pub fn host(&self) -> &PluginHost {
        &self.host
    }

    /// Mutable access to the plugin host
    pub fn host_mut(&mut self) -> &mut PluginHost {
        &mut self.host
    }

    /// Handle one incoming message
    pub async fn handle_message(&mut self, event: &ChatMessage) -> Result<DispatchOutcome, ChatError> {
        // only the prefix and the alias are split off; the rest of the
        // text reaches the tokenizer untouched so quoted spans keep
        // their spacing
        let text = event.text.as_str();
        let (prefix, rest) = text.split_once(' ').unwrap_or((text, ""));
        if !self.prefixes.iter().any(|p| p == prefix) {
            return Ok(DispatchOutcome::NotACommand);
        }

        // flush deferred notifications before anything else
        for message in self.notify.drain() {
            self.client.send_message(event.chat_id, &message).await?;
        }

        let (alias, body) = rest.split_once(' ').unwrap_or((rest, ""));
        if alias.is_empty() {
            return Ok(DispatchOutcome::UnknownCommand);
        }

        if alias == "trust" || alias == "distrust" {
            return self.handle_trust(alias, body, event).await;
        }

        let Some(command) = self.host.commands().resolve(alias) else {
            tracing::debug!(alias = %alias, "Unknown command");
            return Ok(DispatchOutcome::UnknownCommand);
        };
        let plugin_name = command.plugin.clone();
        let spec = command.spec.clone();

        // gate on the top-level node before parsing; parse errors must
        // not be shown to users who can't run the command anyway
        if self.authorize(spec.effective_permission_key(), event.sender_id)
            == AuthorizationResult::Denied
        {
            tracing::debug!(alias = %alias, sender = event.sender_id, "Denied");
            return Ok(DispatchOutcome::Denied);
        }

        let invocation = match parse_invocation(
            &spec,
            prefix,
            body,
            event,
            self.client.as_ref(),
            self.history_lookback,
            &self.tokenizer,
        )
        .await
        {
            Ok(invocation) => invocation,
            Err(ArgumentParseError::History(e)) => {
                tracing::warn!(error = %e, "History lookup failed");
                return Ok(DispatchOutcome::ParseFailed);
            }
            Err(e) => {
                self.client
                    .send_message(event.chat_id, &format_unsuccess(&e.to_string()))
                    .await?;
                return Ok(DispatchOutcome::ParseFailed);
            }
        };

        // the routed leaf carries its own permission list
        if let Some(leaf_key) = leaf_permission_key(&spec, &invocation.path)
            && self.authorize(&leaf_key, event.sender_id) == AuthorizationResult::Denied
        {
            tracing::debug!(path = ?invocation.path, sender = event.sender_id, "Denied");
            return Ok(DispatchOutcome::Denied);
        }

        let reply =
            self.host
                .dispatch_command(&plugin_name, &invocation.path, &invocation.args, event);
        match reply {
            Ok(CommandReply::Text(text)) => {
                self.client.send_message(event.chat_id, &text).await?;
            }
            Ok(CommandReply::Success(text)) => {
                self.client
                    .send_message(event.chat_id, &format_success(&text))
                    .await?;
            }
            Ok(CommandReply::Unsuccess(text)) => {
                self.client
                    .send_message(event.chat_id, &format_unsuccess(&text))
                    .await?;
            }
            Ok(CommandReply::Silent) => {}
            Err(e) => {
                tracing::error!(plugin = %plugin_name, error = %e, "Command handler failed");
                self.client
                    .send_message(event.chat_id, &format_unsuccess("Command failed"))
                    .await?;
            }
        }
        Ok(DispatchOutcome::Completed)
    }

    /// Built-in trust management, owners only. The trustee is the
    /// sender of the replied-to message, or an explicit id:
    /// `trust <command>` (as a reply) or `trust <command> <user_id>`.
    async fn handle_trust(
        &mut self,
        action: &str,
        body: &str,
        event: &ChatMessage,
    ) -> Result<DispatchOutcome, ChatError> {
        if !self.owner_ids.contains(&event.sender_id) {
            return Ok(DispatchOutcome::Denied);
        }

        let words: Vec<&str> = body.split_whitespace().collect();
        let (Some(&alias), Some(user_id)) = (words.first(), self.resolve_trustee(&words, event).await)
        else {
            self.client
                .send_message(
                    event.chat_id,
                    &format_unsuccess(&format!(
                        "Usage: {action} <command> <user_id>, or reply to a message with {action} <command>"
                    )),
                )
                .await?;
            return Ok(DispatchOutcome::ParseFailed);
        };

        let outcome = if action == "trust" {
            self.host.commands_mut().trust(alias, user_id)
        } else {
            self.host.commands_mut().distrust(alias, user_id)
        };

        let reply = match outcome {
            TrustOutcome::Changed if action == "trust" => {
                format_success(&format!("User {user_id} is now trusted for {alias}"))
            }
            TrustOutcome::Changed => {
                format_success(&format!("User {user_id} is no longer trusted for {alias}"))
            }
            TrustOutcome::Unchanged => format_notify("Nothing to change"),
            TrustOutcome::RefusedDanger => {
                format_unsuccess(&format!("{alias} is dangerous and can't be shared"))
            }
            TrustOutcome::UnknownCommand => format_unsuccess(&format!("Unknown command: {alias}")),
        };
        self.client.send_message(event.chat_id, &reply).await?;
        Ok(DispatchOutcome::Completed)
    }

    /// Who a trust request targets: an explicit user id argument wins,
    /// otherwise the sender of the replied-to message
    async fn resolve_trustee(&self, words: &[&str], event: &ChatMessage) -> Option<u64> {
        if let Some(id) = words.get(1).and_then(|s| s.parse().ok()) {
            return Some(id);
        }
        let reply_to = event.reply_to?;
        let history = self
            .client
            .recent_messages(event.chat_id, self.history_lookback)
            .await
            .ok()?;
        history.into_iter().find(|m| m.id == reply_to).map(|m| m.sender_id)
    }

    fn authorize(&self, key: &str, sender: u64) -> AuthorizationResult {
        self.host.commands().authorize(key, sender)
    }
}

/// Permission key of the node `path` routed to, if the path is valid
fn leaf_permission_key(spec: &CommandSpec, path: &[String]) -> Option<String> {
    let mut node = spec;
    for name in path.iter().skip(1) {
        node = node
            .subcommands
            .iter()
            .find(|s| s.primary_alias() == name)?;
    }
    Some(node.effective_permission_key().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::PluginHostConfig;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct RecordingClient {
        sent: Mutex<Vec<String>>,
        history: Vec<ChatMessage>,
    }

    impl RecordingClient {
        fn new() -> Arc<Self> {
            Self::with_history(Vec::new())
        }

        fn with_history(history: Vec<ChatMessage>) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                history,
            })
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        async fn send_message(&self, _chat_id: i64, text: &str) -> Result<(), ChatError> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn recent_messages(
            &self,
            _chat_id: i64,
            limit: usize,
        ) -> Result<Vec<ChatMessage>, ChatError> {
            Ok(self.history.iter().take(limit).cloned().collect())
        }

        async fn download_media(
            &self,
            _message: &ChatMessage,
            _dest: &Path,
        ) -> Result<(), ChatError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), ChatError> {
            Ok(())
        }
    }

    fn dispatcher(dir: &Path, client: Arc<RecordingClient>) -> Dispatcher {
        let mut config = InstanceConfig::default();
        config.owner_ids.insert(1);
        config.auto_update = false;

        let host_config = PluginHostConfig {
            user_plugin_dir: dir.to_path_buf(),
            project_plugin_dir: None,
            cache_dir: dir.join("cache"),
        };
        let notify = Arc::new(NotifyStack::new());
        let host = PluginHost::new(host_config, config.clone(), notify.clone());
        Dispatcher::new(host, client, notify, &config)
    }

    #[tokio::test]
    async fn test_non_prefixed_message_is_ignored() {
        let dir = TempDir::new().unwrap();
        let client = RecordingClient::new();
        let mut dispatcher = dispatcher(dir.path(), client.clone());

        let event = ChatMessage::new(1, 1, 1, "just chatting");
        let outcome = dispatcher.handle_message(&event).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::NotACommand);
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_command_stays_silent() {
        let dir = TempDir::new().unwrap();
        let client = RecordingClient::new();
        let mut dispatcher = dispatcher(dir.path(), client.clone());

        let event = ChatMessage::new(1, 1, 1, "mur nosuchthing");
        let outcome = dispatcher.handle_message(&event).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::UnknownCommand);
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_denied_sender_gets_no_reply() {
        let dir = TempDir::new().unwrap();
        let client = RecordingClient::new();
        let mut dispatcher = dispatcher(dir.path(), client.clone());
        dispatcher
            .host_mut()
            .commands_mut()
            .register("fake", CommandSpec::new("echo", "Echo"))
            .unwrap();

        // sender 99 is neither owner nor trusted
        let event = ChatMessage::new(1, 1, 99, "mur echo hello");
        let outcome = dispatcher.handle_message(&event).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Denied);
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_notify_stack_is_flushed_on_any_command() {
        let dir = TempDir::new().unwrap();
        let client = RecordingClient::new();
        let mut dispatcher = dispatcher(dir.path(), client.clone());
        dispatcher.notify.push("pending note");

        let event = ChatMessage::new(1, 1, 1, "mur whatever");
        dispatcher.handle_message(&event).await.unwrap();

        assert_eq!(client.sent(), vec!["pending note"]);
        // drained, not repeated
        dispatcher.handle_message(&event).await.unwrap();
        assert_eq!(client.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_trust_flow() {
        let dir = TempDir::new().unwrap();
        let client = RecordingClient::new();
        let mut dispatcher = dispatcher(dir.path(), client.clone());
        dispatcher
            .host_mut()
            .commands_mut()
            .register("fake", CommandSpec::new("echo", "Echo"))
            .unwrap();

        let event = ChatMessage::new(1, 1, 1, "mur trust echo 42");
        let outcome = dispatcher.handle_message(&event).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed);
        assert!(client.sent()[0].contains("✅"));
        assert_eq!(
            dispatcher.host().commands().authorize("echo", 42),
            AuthorizationResult::Granted
        );

        let event = ChatMessage::new(2, 1, 1, "mur distrust echo 42");
        dispatcher.handle_message(&event).await.unwrap();
        assert_eq!(
            dispatcher.host().commands().authorize("echo", 42),
            AuthorizationResult::Denied
        );
    }

    #[tokio::test]
    async fn test_trust_resolves_trustee_from_reply() {
        let dir = TempDir::new().unwrap();
        let client = RecordingClient::with_history(vec![
            ChatMessage::new(8, 1, 1, "mur trust echo"),
            ChatMessage::new(7, 1, 42, "can I use this?"),
        ]);
        let mut dispatcher = dispatcher(dir.path(), client.clone());
        dispatcher
            .host_mut()
            .commands_mut()
            .register("fake", CommandSpec::new("echo", "Echo"))
            .unwrap();

        // owner replies to user 42's message with a bare trust command
        let event = ChatMessage::reply(8, 1, 1, "mur trust echo", 7);
        let outcome = dispatcher.handle_message(&event).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed);
        assert_eq!(
            dispatcher.host().commands().authorize("echo", 42),
            AuthorizationResult::Granted
        );
    }

    #[tokio::test]
    async fn test_trust_without_reply_or_id_reports_usage() {
        let dir = TempDir::new().unwrap();
        let client = RecordingClient::new();
        let mut dispatcher = dispatcher(dir.path(), client.clone());
        dispatcher
            .host_mut()
            .commands_mut()
            .register("fake", CommandSpec::new("echo", "Echo"))
            .unwrap();

        let event = ChatMessage::new(1, 1, 1, "mur trust echo");
        let outcome = dispatcher.handle_message(&event).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::ParseFailed);
        assert!(client.sent()[0].contains("Usage"));
    }

    #[tokio::test]
    async fn test_command_body_reaches_parser_unsplit() {
        let dir = TempDir::new().unwrap();
        let client = RecordingClient::new();
        let mut dispatcher = dispatcher(dir.path(), client.clone());
        dispatcher
            .host_mut()
            .commands_mut()
            .register(
                "fake",
                CommandSpec::new("say", "Say").arg(murmur_plugin_api::ArgSpec::required(
                    "text",
                    murmur_plugin_api::ArgKind::Str,
                )),
            )
            .unwrap();

        // the double space after the alias produces a kept empty token;
        // it must reach the parser and overflow the single slot instead
        // of being collapsed away before tokenization
        let event = ChatMessage::new(1, 1, 1, "mur say  spaced");
        let outcome = dispatcher.handle_message(&event).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::ParseFailed);
        assert!(client.sent()[0].contains("Too many"));
    }

    #[tokio::test]
    async fn test_trust_refuses_danger_command() {
        let dir = TempDir::new().unwrap();
        let client = RecordingClient::new();
        let mut dispatcher = dispatcher(dir.path(), client.clone());
        dispatcher
            .host_mut()
            .commands_mut()
            .register("fake", CommandSpec::new("exec", "Run code").danger())
            .unwrap();

        let event = ChatMessage::new(1, 1, 1, "mur trust exec 42");
        dispatcher.handle_message(&event).await.unwrap();
        assert!(client.sent()[0].contains("❌"));
        assert_eq!(
            dispatcher.host().commands().authorize("exec", 42),
            AuthorizationResult::Denied
        );
    }

    #[tokio::test]
    async fn test_trust_from_non_owner_is_dropped() {
        let dir = TempDir::new().unwrap();
        let client = RecordingClient::new();
        let mut dispatcher = dispatcher(dir.path(), client.clone());
        dispatcher
            .host_mut()
            .commands_mut()
            .register("fake", CommandSpec::new("echo", "Echo"))
            .unwrap();

        let event = ChatMessage::new(1, 1, 99, "mur trust echo 42");
        let outcome = dispatcher.handle_message(&event).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Denied);
        assert!(client.sent().is_empty());
    }

    #[tokio::test]
    async fn test_parse_error_is_reported_to_authorized_sender() {
        let dir = TempDir::new().unwrap();
        let client = RecordingClient::new();
        let mut dispatcher = dispatcher(dir.path(), client.clone());
        dispatcher
            .host_mut()
            .commands_mut()
            .register(
                "fake",
                CommandSpec::new("take", "Take").arg(murmur_plugin_api::ArgSpec::required(
                    "x",
                    murmur_plugin_api::ArgKind::Int,
                )),
            )
            .unwrap();

        let event = ChatMessage::new(1, 1, 1, "mur take");
        let outcome = dispatcher.handle_message(&event).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::ParseFailed);
        assert!(client.sent()[0].contains("❌"));
    }
}
