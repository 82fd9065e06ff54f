//! Configuration loading for wgwarden.
//!
//! Settings normally live in `~/.wgwarden/settings.json`. Any file without a
//! `.json` extension is read as the older `api_token.txt` key/value format.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

pub const ENV_BOT_TOKEN: &str = "WGWARDEN_BOT_TOKEN";
pub const ENV_CHAT_ID: &str = "WGWARDEN_CHAT_ID";

/// Get the wgwarden home directory (~/.wgwarden).
pub fn get_home_dir() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(".wgwarden"))
}

/// Get the default settings file path.
pub fn get_settings_path() -> Result<PathBuf> {
    Ok(get_home_dir()?.join("settings.json"))
}

/// Load settings from an explicit path, or from ~/.wgwarden/settings.json.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => get_settings_path()?,
    };

    if !path.exists() {
        return Err(Error::Config(format!(
            "Settings file not found at {}",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(&path)?;
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut settings = if is_json {
        serde_json::from_str::<Settings>(&content)?
    } else {
        tracing::debug!("Reading legacy token file {}", path.display());
        parse_legacy_settings(&content)
    };

    settings.apply_env_overrides(|key| std::env::var(key).ok());
    settings.validate()?;

    tracing::debug!("Loaded settings from {}", path.display());
    Ok(settings)
}

/// Parse the `api_token.txt` format: `token = ...`, `chat_id = 123`,
/// `SSH_HOST=...`, `SSH_PORT=22`, `SSH_USERNAME=...`, `SSH_PASSWORD=...`.
pub fn parse_legacy_settings(content: &str) -> Settings {
    let capture = |pattern: &str| -> Option<String> {
        let re = Regex::new(pattern).ok()?;
        re.captures(content)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let mut settings = Settings::default();
    settings.telegram.bot_token = capture(r"(?m)^\s*token\s*=\s*([^\n]+)");
    settings.telegram.chat_id = capture(r"(?m)^\s*chat_id\s*=\s*(-?\d+)").and_then(|v| v.parse().ok());

    if let Some(host) = capture(r"SSH_HOST=([^\n]+)") {
        settings.host.mode = HostMode::Ssh;
        settings.host.ssh.host = Some(host);
    }
    if let Some(port) = capture(r"SSH_PORT=(\d+)").and_then(|v| v.parse().ok()) {
        settings.host.ssh.port = port;
    }
    settings.host.ssh.username = capture(r"SSH_USERNAME=([^\n]+)");
    settings.host.ssh.password = capture(r"SSH_PASSWORD=([^\n]+)");

    settings
}

/// Telegram bot configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TelegramConfig {
    pub bot_token: Option<String>,
    /// The single chat allowed to operate the bot.
    pub chat_id: Option<i64>,
}

/// WireGuard host layout.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WireguardConfig {
    #[serde(default = "default_interface")]
    pub interface: String,
    #[serde(default = "default_config_path")]
    pub config_path: PathBuf,
    #[serde(default = "default_clients_dir")]
    pub clients_dir: PathBuf,
}

fn default_interface() -> String {
    "wg0".to_string()
}

fn default_config_path() -> PathBuf {
    PathBuf::from("/etc/wireguard/wg0.conf")
}

fn default_clients_dir() -> PathBuf {
    PathBuf::from("/etc/wireguard/clients")
}

impl Default for WireguardConfig {
    fn default() -> Self {
        Self {
            interface: default_interface(),
            config_path: default_config_path(),
            clients_dir: default_clients_dir(),
        }
    }
}

/// How commands reach the WireGuard host.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HostMode {
    #[default]
    Local,
    Ssh,
}

/// SSH connection settings, used when `host.mode` is `ssh`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SshConfig {
    pub host: Option<String>,
    #[serde(default = "default_ssh_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub identity_file: Option<PathBuf>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Directory for the multiplexing control socket. Defaults to the temp dir.
    pub control_dir: Option<PathBuf>,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_ssh_port(),
            username: None,
            password: None,
            identity_file: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            control_dir: None,
        }
    }
}

/// Reconnect policy for the host channel.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct RetryConfig {
    #[serde(default = "default_retry_attempts")]
    pub attempts: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    5000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_retry_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Host channel configuration.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct HostConfig {
    #[serde(default)]
    pub mode: HostMode,
    #[serde(default)]
    pub ssh: SshConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Monitoring configuration.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Monitoring {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Notify about peers already connected when the bot starts.
    #[serde(default)]
    pub notify_on_startup: bool,
    /// Also announce new credential files appearing in `clients_dir`.
    #[serde(default)]
    pub watch_client_files: bool,
}

fn default_poll_interval() -> u64 {
    60
}

impl Monitoring {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            notify_on_startup: false,
            watch_client_files: false,
        }
    }
}

/// wgwarden settings.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub wireguard: WireguardConfig,

    #[serde(default)]
    pub host: HostConfig,

    #[serde(default)]
    pub monitoring: Monitoring,
}

impl Settings {
    /// Apply `WGWARDEN_BOT_TOKEN` / `WGWARDEN_CHAT_ID` on top of the file values.
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup(ENV_BOT_TOKEN).filter(|t| !t.trim().is_empty()) {
            self.telegram.bot_token = Some(token.trim().to_string());
        }
        if let Some(chat_id) = lookup(ENV_CHAT_ID) {
            match chat_id.trim().parse() {
                Ok(id) => self.telegram.chat_id = Some(id),
                Err(_) => tracing::warn!("Ignoring non-numeric {}: {}", ENV_CHAT_ID, chat_id),
            }
        }
    }

    /// Check settings that every command needs.
    pub fn validate(&self) -> Result<()> {
        if self.monitoring.poll_interval_secs == 0 {
            return Err(Error::Config(
                "monitoring.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.host.retry.attempts == 0 {
            return Err(Error::Config(
                "host.retry.attempts must be at least 1".to_string(),
            ));
        }
        if self.host.mode == HostMode::Ssh {
            if self.host.ssh.host.as_deref().map_or(true, str::is_empty) {
                return Err(Error::Config("host.ssh.host is required in ssh mode".to_string()));
            }
            if self.host.ssh.username.as_deref().map_or(true, str::is_empty) {
                return Err(Error::Config(
                    "host.ssh.username is required in ssh mode".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Bot token and authorized chat, required only to run the bot.
    pub fn telegram_credentials(&self) -> Result<(String, i64)> {
        let token = self
            .telegram
            .bot_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Config("No bot token configured".to_string()))?;
        let chat_id = self
            .telegram
            .chat_id
            .ok_or_else(|| Error::Config("No authorized chat_id configured".to_string()))?;
        Ok((token, chat_id))
    }
}
