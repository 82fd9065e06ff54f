//! Message texts and HTML rendering for the bot.

use std::collections::HashMap;
use teloxide::types::{KeyboardButton, KeyboardMarkup};
use teloxide::utils::html::escape;

use crate::monitor::Event;
use crate::wireguard::{DeleteOutcome, NotFoundReason, PeerRecord};

pub const MENU_STATUS: &str = "📊 WireGuard status";
pub const MENU_CLIENTS: &str = "👥 Client list";
pub const MENU_DELETE: &str = "🗑 Delete client";

pub const WELCOME: &str = "🔐 WireGuard Manager Bot\n\nChoose an action:";
pub const NO_ACCESS: &str = "You do not have access to this bot.";
pub const UNKNOWN_COMMAND: &str = "Unknown command. Use the menu.";
pub const DELETE_PROMPT: &str = "Enter the name of the client to delete (without .conf):\n/cancel to abort.";
pub const DELETE_EMPTY_NAME: &str = "Name cannot be empty. Operation cancelled.";
pub const DELETE_CANCELLED: &str = "Deletion cancelled.";
pub const NOTHING_TO_CANCEL: &str = "Nothing to cancel.";
pub const STATUS_FAILED: &str = "❌ Could not get WireGuard status";
pub const NO_ACTIVE_CLIENTS: &str = "📭 No active clients";

pub const HELP_TEXT: &str = "WireGuard Manager Bot

/start - Show the menu
/status - Interface status
/clients - Connected clients
/delete [name] - Delete a client
/cancel - Abort a pending delete
/help - Show this help";

/// Telegram rejects messages over 4096 characters; leave room for markup.
pub const MESSAGE_LIMIT: usize = 3900;

const KEY_PREVIEW_CHARS: usize = 20;
const NOT_AVAILABLE: &str = "n/a";

pub fn menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(MENU_STATUS), KeyboardButton::new(MENU_CLIENTS)],
        vec![KeyboardButton::new(MENU_DELETE)],
    ])
    .resize_keyboard()
}

/// Display form of a public key: first 20 characters and an ellipsis.
pub fn truncate_key(key: &str) -> String {
    let head: String = key.chars().take(KEY_PREVIEW_CHARS).collect();
    format!("{}...", head)
}

/// Raw `wg show` output in a preformatted block.
pub fn render_status(raw: &str) -> String {
    let mut body = raw.trim_end().to_string();
    if body.chars().count() > MESSAGE_LIMIT {
        body = body.chars().take(MESSAGE_LIMIT).collect();
        body.push_str("\n...[truncated]");
    }
    format!("📊 WireGuard status:\n\n<pre>{}</pre>", escape(&body))
}

pub fn render_clients(peers: &[PeerRecord], names: &HashMap<String, String>) -> String {
    if peers.is_empty() {
        return NO_ACTIVE_CLIENTS.to_string();
    }

    let mut message = String::from("👥 <b>WireGuard clients:</b>\n\n");
    for (i, peer) in peers.iter().enumerate() {
        message.push_str(&format!(
            "<b>{}. Peer:</b> <code>{}</code>",
            i + 1,
            escape(&truncate_key(&peer.public_key))
        ));
        if let Some(name) = names.get(&peer.public_key) {
            message.push_str(&format!("\n   📝 Name: <b>{}</b>", escape(name)));
        }
        message.push_str(&format!(
            "\n   📡 Latest handshake: {}",
            escape(peer.latest_handshake().unwrap_or(NOT_AVAILABLE))
        ));
        message.push_str(&format!(
            "\n   📊 Transfer: {}\n\n",
            escape(peer.transfer().unwrap_or(NOT_AVAILABLE))
        ));
    }
    message
}

pub fn render_event(event: &Event) -> String {
    match event {
        Event::NewPeer {
            peer,
            client_name,
            detected_at,
        } => {
            let mut message = String::from("🆕 <b>New WireGuard client!</b>\n\n");
            if let Some(name) = client_name {
                message.push_str(&format!("📝 <b>Client name:</b> {}\n", escape(name)));
            }
            message.push_str(&format!(
                "🔑 <b>Public key:</b> <code>{}</code>\n",
                escape(&truncate_key(&peer.public_key))
            ));
            if let Some(endpoint) = peer.endpoint() {
                message.push_str(&format!("📍 <b>Endpoint:</b> {}\n", escape(endpoint)));
            }
            if let Some(ips) = peer.allowed_ips() {
                message.push_str(&format!("🌐 <b>Allowed IPs:</b> {}\n", escape(ips)));
            }
            message.push_str(&format!("🕐 <b>Detected:</b> {}\n", escape(detected_at)));
            message
        }
        Event::NewClientFile { info, detected_at } => {
            let mut message = String::from("🆕 <b>New client configuration!</b>\n\n");
            message.push_str(&format!("👤 <b>Client:</b> {}\n", escape(&info.client_name)));
            message.push_str(&format!("📄 <b>File:</b> <code>{}</code>\n", escape(&info.file_name)));
            if let Some(key) = &info.public_key {
                message.push_str(&format!(
                    "🔑 <b>Public key:</b> <code>{}</code>\n",
                    escape(&truncate_key(key))
                ));
            }
            if let Some(ips) = &info.allowed_ips {
                message.push_str(&format!("🌐 <b>Allowed IPs:</b> {}\n", escape(ips)));
            }
            if let Some(endpoint) = &info.endpoint {
                message.push_str(&format!("📍 <b>Endpoint:</b> {}\n", escape(endpoint)));
            }
            let created = info.created.as_deref().unwrap_or(detected_at);
            message.push_str(&format!("🕐 <b>Created:</b> {}\n", escape(created)));
            message
        }
    }
}

pub fn render_delete_outcome(name: &str, outcome: &DeleteOutcome) -> String {
    let name = escape(name);
    match outcome {
        DeleteOutcome::Removed => format!("✅ Client {} deleted and WireGuard restarted", name),
        DeleteOutcome::NotFound(NotFoundReason::CredentialFile) => {
            format!("Client {} not found (no {}.conf in the clients directory).", name, name)
        }
        DeleteOutcome::NotFound(NotFoundReason::ConfigBlock) => {
            format!("Client {} not found in the WireGuard config.", name)
        }
        DeleteOutcome::PartialFailure { reason } => format!(
            "⚠️ Client {} removed from the WireGuard config, but {}\nCheck the host by hand.",
            name,
            escape(reason)
        ),
    }
}

/// Split at blank lines into messages of at most `limit` characters.
/// A single block longer than `limit` is sent on its own.
pub fn split_blocks(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for block in text.split("\n\n").filter(|b| !b.trim().is_empty()) {
        let needed = if current.is_empty() { block.len() } else { current.len() + 2 + block.len() };
        if needed > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(block);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
