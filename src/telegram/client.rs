//! Bot startup: command registration, the monitor task and the polling loop.

use std::sync::Arc;
use teloxide::prelude::*;
use teloxide::types::BotCommand;

use super::handler::handle_message;
use super::{BotContext, TelegramNotifier};
use crate::config::Settings;
use crate::error::Result;
use crate::host::HostChannel;
use crate::monitor::Monitor;
use crate::wireguard::ClientDirectory;

/// Run the bot and the peer monitor until Ctrl+C.
pub async fn run_bot(settings: Settings, host: Arc<dyn HostChannel>) -> Result<()> {
    let (token, chat_id) = settings.telegram_credentials()?;
    let chat_id = ChatId(chat_id);

    tracing::info!("Starting Telegram bot for chat {} ({})", chat_id.0, host.describe());
    let bot = Bot::new(token);

    if let Err(e) = bot
        .set_my_commands(vec![
            BotCommand::new("start", "Show the menu"),
            BotCommand::new("status", "WireGuard interface status"),
            BotCommand::new("clients", "List connected clients"),
            BotCommand::new("delete", "Delete a client"),
            BotCommand::new("cancel", "Abort a pending delete"),
            BotCommand::new("help", "Show help"),
        ])
        .await
    {
        tracing::warn!("Failed to set commands: {}", e);
    }

    let directory = ClientDirectory::new(host.clone(), settings.wireguard.clone());
    let notifier = Arc::new(TelegramNotifier::new(bot.clone(), chat_id));
    let monitor = Monitor::new(directory.clone(), &settings.monitoring, notifier);
    let monitor_task = tokio::spawn(monitor.run());

    let ctx = BotContext::new(directory, chat_id);
    teloxide::repl(bot, move |bot: Bot, msg: Message| {
        let ctx = ctx.clone();
        async move { handle_message(bot, msg, ctx).await }
    })
    .await;

    tracing::info!("Telegram bot stopped, shutting down monitor");
    monitor_task.abort();
    host.close().await;
    Ok(())
}
