//! Console loopback transport
//!
//! Stands in for a real messaging network: stdin lines become messages,
//! outgoing messages go to stdout. Keeps a rolling history so reply-to
//! arguments can be exercised from the terminal.

use async_trait::async_trait;
use murmur_core::chat::{ChatClient, ChatError};
use murmur_plugin_api::ChatMessage;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

/// How many console messages to keep for history lookups
const HISTORY_CAPACITY: usize = 200;

/// Chat id used for the single console "chat"
pub const CONSOLE_CHAT_ID: i64 = 0;

pub struct LoopbackClient {
    history: Mutex<VecDeque<ChatMessage>>,
    next_id: AtomicI64,
    sender_id: u64,
}

impl LoopbackClient {
    pub fn new(sender_id: u64) -> Self {
        Self {
            history: Mutex::new(VecDeque::new()),
            next_id: AtomicI64::new(1),
            sender_id,
        }
    }

    /// Turn one console line into a chat message and record it.
    ///
    /// A line of the form `@<id> text` marks the message as a reply to
    /// an earlier message id.
    pub fn record_line(&self, line: &str) -> ChatMessage {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply_to, text) = parse_reply_marker(line);

        let message = match reply_to {
            Some(reply_to) => {
                ChatMessage::reply(id, CONSOLE_CHAT_ID, self.sender_id, text, reply_to)
            }
            None => ChatMessage::new(id, CONSOLE_CHAT_ID, self.sender_id, text),
        };

        let mut history = self.history.lock().expect("history poisoned");
        history.push_front(message.clone());
        history.truncate(HISTORY_CAPACITY);
        message
    }
}

fn parse_reply_marker(line: &str) -> (Option<i64>, &str) {
    if let Some(rest) = line.strip_prefix('@')
        && let Some((id, text)) = rest.split_once(' ')
        && let Ok(id) = id.parse()
    {
        return (Some(id), text);
    }
    (None, line)
}

#[async_trait]
impl ChatClient for LoopbackClient {
    async fn send_message(&self, _chat_id: i64, text: &str) -> Result<(), ChatError> {
        println!("{text}");
        Ok(())
    }

    async fn recent_messages(
        &self,
        _chat_id: i64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, ChatError> {
        let history = self.history.lock().expect("history poisoned");
        Ok(history.iter().take(limit).cloned().collect())
    }

    async fn download_media(
        &self,
        _message: &ChatMessage,
        _dest: &Path,
    ) -> Result<(), ChatError> {
        Err(ChatError::Download(
            "the console transport has no media".to_string(),
        ))
    }

    async fn disconnect(&self) -> Result<(), ChatError> {
        Ok(())
    }
}
