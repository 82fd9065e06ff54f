//! wgwarden library root.

pub mod cli;
pub mod config;
pub mod error;
pub mod host;
pub mod logging;
pub mod monitor;
pub mod telegram;
pub mod wireguard;

pub use cli::Commands;
pub use config::{load_settings, Settings};
pub use error::{Error, Result};
pub use host::{connect_from_config, HostChannel};
pub use monitor::{Monitor, Notifier};
pub use telegram::run_bot;
pub use wireguard::{ClientDirectory, ConfigDocument, DeleteOutcome};
