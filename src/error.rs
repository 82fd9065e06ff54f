//! Error types for wgwarden.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The host channel could not be opened (unreachable host, auth failure).
    #[error("Connection error: {0}")]
    Connection(String),

    /// A command ran on the host but reported failure.
    #[error("Command `{command}` failed: {message}")]
    Command { command: String, message: String },

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Invalid client name: {0:?}")]
    InvalidClientName(String),
}

impl Error {
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Command {
            command: command.into(),
            message: message.into(),
        }
    }
}
