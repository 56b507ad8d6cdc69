//! Deferred notification stack
//!
//! Components that want to tell the user something outside a command
//! response (update results, activation warnings) push onto this stack;
//! the dispatcher drains it into the chat the next time any command
//! arrives.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Thread-safe FIFO of pending notification texts
#[derive(Default)]
pub struct NotifyStack {
    pending: Mutex<VecDeque<String>>,
}

impl NotifyStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a notification for the next command invocation
    pub fn push(&self, message: impl Into<String>) {
        let mut pending = self.pending.lock().expect("notify stack poisoned");
        pending.push_back(message.into());
    }

    /// Take all pending notifications, oldest first, leaving the stack
    /// empty
    pub fn drain(&self) -> Vec<String> {
        let mut pending = self.pending.lock().expect("notify stack poisoned");
        pending.drain(..).collect()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        let pending = self.pending.lock().expect("notify stack poisoned");
        pending.is_empty()
    }
}
