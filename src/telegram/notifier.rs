//! Monitor events delivered as Telegram messages.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::ParseMode;

use super::render::render_event;
use crate::error::{Error, Result};
use crate::monitor::{Event, Notifier};

/// Sends every event to the authorized chat.
pub struct TelegramNotifier {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self { bot, chat_id }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, event: &Event) -> Result<()> {
        self.bot
            .send_message(self.chat_id, render_event(event))
            .parse_mode(ParseMode::Html)
            .await
            .map_err(|e| Error::Telegram(e.to_string()))?;
        Ok(())
    }
}
