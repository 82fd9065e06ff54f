//! Per-chat conversation state.

use std::collections::HashSet;
use teloxide::types::ChatId;
use tokio::sync::Mutex;

/// Chats whose next plain-text message is the name of a client to delete.
/// Keyed by chat, so one chat's pending delete never leaks into another.
#[derive(Debug, Default)]
pub struct SessionStore {
    pending_deletes: Mutex<HashSet<ChatId>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin_delete(&self, chat: ChatId) {
        self.pending_deletes.lock().await.insert(chat);
    }

    /// Leave delete mode. Returns whether the chat was in it.
    pub async fn take_pending_delete(&self, chat: ChatId) -> bool {
        self.pending_deletes.lock().await.remove(&chat)
    }
}
