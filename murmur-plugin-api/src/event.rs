//! Chat event types crossing the host/plugin boundary

use serde::{Deserialize, Serialize};

/// A single chat message, as delivered by the transport.
///
/// This is the event handed to command handlers. The transport itself is
/// external to the framework; only this shape is agreed on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message id, unique within the chat
    pub id: i64,
    /// Chat the message was posted in
    pub chat_id: i64,
    /// User who sent the message
    pub sender_id: u64,
    /// Message text
    pub text: String,
    /// Id of the message this one replies to, if any
    pub reply_to: Option<i64>,
}

impl ChatMessage {
    /// Construct a plain, non-reply message
    pub fn new(id: i64, chat_id: i64, sender_id: u64, text: impl Into<String>) -> Self {
        Self {
            id,
            chat_id,
            sender_id,
            text: text.into(),
            reply_to: None,
        }
    }

    /// Construct a reply to another message
    pub fn reply(
        id: i64,
        chat_id: i64,
        sender_id: u64,
        text: impl Into<String>,
        reply_to: i64,
    ) -> Self {
        Self {
            id,
            chat_id,
            sender_id,
            text: text.into(),
            reply_to: Some(reply_to),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_carries_original_id() {
        let msg = ChatMessage::reply(10, 1, 42, "hi", 7);
        assert_eq!(msg.reply_to, Some(7));
    }

    #[test]
    fn test_plain_message_has_no_reply() {
        let msg = ChatMessage::new(10, 1, 42, "hi");
        assert!(msg.reply_to.is_none());
    }
}
