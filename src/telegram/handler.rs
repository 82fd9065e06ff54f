//! Telegram message routing.

use teloxide::prelude::*;
use teloxide::types::{ChatId, Message};
use teloxide::RequestError;

use super::commands::{cmd_clients, cmd_delete, cmd_delete_prompt, cmd_status};
use super::render::{
    menu_keyboard, DELETE_CANCELLED, HELP_TEXT, MENU_CLIENTS, MENU_DELETE,
    MENU_STATUS, NOTHING_TO_CANCEL, NO_ACCESS, UNKNOWN_COMMAND, WELCOME,
};
use super::BotContext;

/// What an incoming text asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Start,
    Help,
    Cancel,
    Status,
    Clients,
    /// Delete with the name given inline, or prompt when `None`.
    Delete(Option<String>),
    /// Plain text: a client name when a delete is pending.
    Text(String),
    UnknownCommand,
}

/// Map message text to a request. Bot-name suffixes (`/status@my_bot`) are ignored.
pub fn parse_request(text: &str) -> Request {
    let text = text.trim();
    match text {
        MENU_STATUS => return Request::Status,
        MENU_CLIENTS => return Request::Clients,
        MENU_DELETE => return Request::Delete(None),
        _ => {}
    }

    if !text.starts_with('/') {
        return Request::Text(text.to_string());
    }

    let mut parts = text.splitn(2, char::is_whitespace);
    let command = parts
        .next()
        .unwrap_or("")
        .split('@')
        .next()
        .unwrap_or("");
    let arg = parts.next().map(str::trim).filter(|a| !a.is_empty());

    match command {
        "/start" => Request::Start,
        "/help" => Request::Help,
        "/cancel" => Request::Cancel,
        "/status" => Request::Status,
        "/clients" => Request::Clients,
        "/delete" => Request::Delete(arg.map(str::to_string)),
        _ => Request::UnknownCommand,
    }
}

/// What to do with a message once access and the pending delete are known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Refuse,
    ShowMenu,
    ShowHelp,
    /// `was_pending` tells whether a delete was actually aborted.
    Cancel { was_pending: bool },
    Status,
    Clients,
    PromptDelete,
    Delete(String),
    Unknown,
}

/// Decide the action for `request` from `chat`.
///
/// Other chats are refused whatever they send. A pending delete is consumed
/// by any message: plain text names the client, anything else drops it.
pub fn route(chat: ChatId, authorized: ChatId, pending_delete: bool, request: Request) -> Action {
    if chat != authorized {
        return Action::Refuse;
    }
    match request {
        Request::Start => Action::ShowMenu,
        Request::Help => Action::ShowHelp,
        Request::Cancel => Action::Cancel {
            was_pending: pending_delete,
        },
        Request::Status => Action::Status,
        Request::Clients => Action::Clients,
        Request::Delete(None) => Action::PromptDelete,
        Request::Delete(Some(name)) => Action::Delete(name),
        Request::Text(name) if pending_delete => Action::Delete(name),
        Request::Text(_) | Request::UnknownCommand => Action::Unknown,
    }
}

/// Handle incoming messages.
pub async fn handle_message(bot: Bot, msg: Message, ctx: BotContext) -> Result<(), RequestError> {
    let chat_id = msg.chat.id;
    let authorized = chat_id == ctx.authorized_chat;

    let text = msg.text();
    if authorized && text.is_none() {
        return Ok(());
    }
    let request = parse_request(text.unwrap_or_default());

    let pending_delete = authorized && ctx.sessions.take_pending_delete(chat_id).await;
    let action = route(chat_id, ctx.authorized_chat, pending_delete, request);
    tracing::debug!("Chat {}: {:?}", chat_id.0, action);

    match action {
        Action::Refuse => {
            let sender = msg
                .from
                .as_ref()
                .map(|u| u.id.0.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            tracing::warn!("Refused message from chat {} (sender {})", chat_id.0, sender);
            bot.send_message(chat_id, NO_ACCESS).await?;
        }
        Action::ShowMenu => {
            bot.send_message(chat_id, WELCOME)
                .reply_markup(menu_keyboard())
                .await?;
        }
        Action::ShowHelp => {
            bot.send_message(chat_id, HELP_TEXT)
                .reply_markup(menu_keyboard())
                .await?;
        }
        Action::Cancel { was_pending } => {
            let reply = if was_pending { DELETE_CANCELLED } else { NOTHING_TO_CANCEL };
            bot.send_message(chat_id, reply).await?;
        }
        Action::Status => cmd_status(&bot, chat_id, &ctx).await?,
        Action::Clients => cmd_clients(&bot, chat_id, &ctx).await?,
        Action::PromptDelete => cmd_delete_prompt(&bot, chat_id, &ctx).await?,
        Action::Delete(name) => cmd_delete(&bot, chat_id, &ctx, &name).await?,
        Action::Unknown => {
            bot.send_message(chat_id, UNKNOWN_COMMAND).await?;
        }
    }

    Ok(())
}
