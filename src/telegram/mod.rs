//! Telegram bot integration.

pub mod client;
pub mod commands;
pub mod handler;
pub mod notifier;
pub mod render;
pub mod session;

use std::sync::Arc;
use teloxide::types::ChatId;

use crate::wireguard::ClientDirectory;
use session::SessionStore;

pub use client::run_bot;
pub use notifier::TelegramNotifier;

/// State shared by every message handler.
#[derive(Clone)]
pub struct BotContext {
    pub directory: ClientDirectory,
    pub authorized_chat: ChatId,
    pub sessions: Arc<SessionStore>,
}

impl BotContext {
    pub fn new(directory: ClientDirectory, authorized_chat: ChatId) -> Self {
        Self {
            directory,
            authorized_chat,
            sessions: Arc::new(SessionStore::new()),
        }
    }
}
