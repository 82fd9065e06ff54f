//! Operator commands behind the menu buttons.

use teloxide::prelude::*;
use teloxide::types::ParseMode;
use teloxide::RequestError;

use super::render::{
    render_clients, render_delete_outcome, render_status, split_blocks, DELETE_EMPTY_NAME,
    DELETE_PROMPT, MESSAGE_LIMIT, STATUS_FAILED,
};
use super::BotContext;
use crate::error::Error;
use crate::wireguard::{query_peers, query_status, validate_client_name};

async fn send_html(bot: &Bot, chat_id: ChatId, text: String) -> Result<(), RequestError> {
    for chunk in split_blocks(&text, MESSAGE_LIMIT) {
        bot.send_message(chat_id, chunk)
            .parse_mode(ParseMode::Html)
            .await?;
    }
    Ok(())
}

/// Show the raw interface status.
pub async fn cmd_status(bot: &Bot, chat_id: ChatId, ctx: &BotContext) -> Result<(), RequestError> {
    let directory = &ctx.directory;
    match query_status(directory.host(), directory.interface()).await {
        Ok(status) if !status.trim().is_empty() => {
            bot.send_message(chat_id, render_status(&status))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Ok(_) => {
            bot.send_message(chat_id, STATUS_FAILED).await?;
        }
        Err(e) => {
            tracing::error!("Status query failed: {}", e);
            bot.send_message(chat_id, format!("{}: {}", STATUS_FAILED, e)).await?;
        }
    }
    Ok(())
}

/// List connected peers with their client names.
pub async fn cmd_clients(bot: &Bot, chat_id: ChatId, ctx: &BotContext) -> Result<(), RequestError> {
    let directory = &ctx.directory;
    let peers = match query_peers(directory.host(), directory.interface()).await {
        Ok(peers) => peers,
        Err(e) => {
            tracing::error!("Peer query failed: {}", e);
            bot.send_message(chat_id, format!("❌ Error: {}", e)).await?;
            return Ok(());
        }
    };

    let names = if peers.is_empty() {
        Default::default()
    } else {
        match directory.load_document().await {
            Ok(doc) => doc.pubkey_to_name(),
            Err(e) => {
                tracing::warn!("Could not read config for client names: {}", e);
                Default::default()
            }
        }
    };

    send_html(bot, chat_id, render_clients(&peers, &names)).await
}

/// Enter delete mode for this chat.
pub async fn cmd_delete_prompt(bot: &Bot, chat_id: ChatId, ctx: &BotContext) -> Result<(), RequestError> {
    ctx.sessions.begin_delete(chat_id).await;
    bot.send_message(chat_id, DELETE_PROMPT).await?;
    Ok(())
}

/// Delete the named client and report the outcome.
pub async fn cmd_delete(bot: &Bot, chat_id: ChatId, ctx: &BotContext, raw_name: &str) -> Result<(), RequestError> {
    if raw_name.trim().is_empty() {
        bot.send_message(chat_id, DELETE_EMPTY_NAME).await?;
        return Ok(());
    }

    let name = match validate_client_name(raw_name) {
        Ok(name) => name,
        Err(e) => {
            bot.send_message(
                chat_id,
                format!("{}\nUse letters, digits, '-', '_' or '.'.", e),
            )
            .await?;
            return Ok(());
        }
    };

    bot.send_message(chat_id, format!("🔄 Deleting {} and restarting WireGuard...", name))
        .await?;

    match ctx.directory.delete_client(&name).await {
        Ok(outcome) => {
            tracing::info!("Delete {} finished: {:?}", name, outcome);
            bot.send_message(chat_id, render_delete_outcome(&name, &outcome))
                .parse_mode(ParseMode::Html)
                .await?;
        }
        Err(e) => {
            tracing::error!("Delete {} failed: {}", name, e);
            let reply = match e {
                Error::Connection(_) => format!("❌ Host unreachable, {} was not deleted: {}", name, e),
                _ => format!("❌ Error while deleting client: {}", e),
            };
            bot.send_message(chat_id, reply).await?;
        }
    }
    Ok(())
}
