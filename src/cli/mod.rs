//! CLI commands for wgwarden using clap.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{load_settings, Settings};
use crate::host::{connect_from_config, HostChannel};
use crate::logging::{LogFormat, LogOptions};
use crate::telegram::render::truncate_key;
use crate::telegram::run_bot;
use crate::wireguard::{query_peers, query_status, ClientDirectory, DeleteOutcome, NotFoundReason};

/// wgwarden - WireGuard administration over Telegram.
#[derive(Parser)]
#[command(name = "wgwarden")]
#[command(version)]
#[command(about = "Manage and monitor a WireGuard host from Telegram", long_about = None)]
pub struct Commands {
    /// Settings file (JSON, or the legacy key = value token file)
    #[arg(short, long, global = true, env = "WGWARDEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log file format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text, env = "WGWARDEN_LOG_FORMAT")]
    pub log_format: LogFormat,

    /// Log directory (defaults to the platform data directory)
    #[arg(long, global = true, env = "WGWARDEN_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the Telegram bot and the new-peer monitor
    Run,

    /// Print the interface status
    Status,

    /// List connected peers with their client names
    Peers,

    /// Delete a client and restart the interface
    Delete {
        /// Client name, without .conf
        name: String,
    },

    /// Check that the host is reachable and WireGuard answers
    Check,
}

impl Commands {
    /// Logging setup for this invocation. One-shot commands print their
    /// result on stdout, so their console log is limited to warnings.
    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            format: self.log_format,
            dir: self.log_dir.clone(),
            quiet_console: matches!(
                self.command,
                Command::Status | Command::Peers | Command::Delete { .. }
            ),
        }
    }

    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        let settings = load_settings(self.config.as_deref())?;
        let host = connect_from_config(&settings.host)?;

        let result = match &self.command {
            Command::Run => return run_bot(settings, host).await.map_err(Into::into),
            Command::Status => cmd_status(&settings, host.as_ref()).await,
            Command::Peers => cmd_peers(&settings, host.clone()).await,
            Command::Delete { name } => cmd_delete(&settings, host.clone(), name).await,
            Command::Check => cmd_check(&settings, host.as_ref()).await,
        };

        host.close().await;
        result
    }
}

async fn cmd_status(settings: &Settings, host: &dyn HostChannel) -> Result<()> {
    let status = query_status(host, &settings.wireguard.interface).await?;
    print!("{}", status);
    Ok(())
}

async fn cmd_peers(settings: &Settings, host: Arc<dyn HostChannel>) -> Result<()> {
    let directory = ClientDirectory::new(host, settings.wireguard.clone());
    let peers = query_peers(directory.host(), directory.interface()).await?;
    if peers.is_empty() {
        println!("No active clients");
        return Ok(());
    }

    let names = match directory.load_document().await {
        Ok(doc) => doc.pubkey_to_name(),
        Err(e) => {
            tracing::warn!("Could not read config for client names: {}", e);
            Default::default()
        }
    };

    for (i, peer) in peers.iter().enumerate() {
        let name = names.get(&peer.public_key).map(String::as_str).unwrap_or("-");
        println!("{}. {} {}", i + 1, truncate_key(&peer.public_key), name);
        println!("   latest handshake: {}", peer.latest_handshake().unwrap_or("n/a"));
        println!("   transfer: {}", peer.transfer().unwrap_or("n/a"));
    }
    Ok(())
}

async fn cmd_delete(settings: &Settings, host: Arc<dyn HostChannel>, name: &str) -> Result<()> {
    let directory = ClientDirectory::new(host, settings.wireguard.clone());
    let outcome = directory
        .delete_client(name)
        .await
        .with_context(|| format!("Failed to delete client {}", name))?;

    match outcome {
        DeleteOutcome::Removed => println!("Client {} deleted and WireGuard restarted", name),
        DeleteOutcome::NotFound(NotFoundReason::CredentialFile) => anyhow::bail!(
            "Client {} not found: no {}",
            name,
            directory.credential_path(name).display()
        ),
        DeleteOutcome::NotFound(NotFoundReason::ConfigBlock) => anyhow::bail!(
            "Client {} not found in {}",
            name,
            settings.wireguard.config_path.display()
        ),
        DeleteOutcome::PartialFailure { reason } => anyhow::bail!(
            "Client {} removed from the config, but {}",
            name,
            reason
        ),
    }
    Ok(())
}

async fn cmd_check(settings: &Settings, host: &dyn HostChannel) -> Result<()> {
    println!("Host: {}", host.describe());
    println!("Interface: {}", settings.wireguard.interface);

    let status = query_status(host, &settings.wireguard.interface)
        .await
        .context("WireGuard status query failed")?;
    let peers = crate::wireguard::parse_status(&status);

    println!("Status: OK ({} peer(s))", peers.len());
    for peer in &peers {
        println!("  {}", truncate_key(&peer.public_key));
    }

    match host.file_exists(&settings.wireguard.config_path).await {
        Ok(true) => println!("Config: {}", settings.wireguard.config_path.display()),
        Ok(false) => println!("Config: {} (missing)", settings.wireguard.config_path.display()),
        Err(e) => println!("Config: unreadable ({})", e),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delete() {
        let args = Commands::try_parse_from(["wgwarden", "delete", "alice"]).unwrap();
        match args.command {
            Command::Delete { name } => assert_eq!(name, "alice"),
            _ => panic!("expected delete"),
        }
    }

    #[test]
    fn test_config_flag_is_global() {
        let args = Commands::try_parse_from(["wgwarden", "check", "--config", "/tmp/wg.json"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/tmp/wg.json")));
        assert!(matches!(args.command, Command::Check));
    }

    #[test]
    fn test_log_options() {
        let args = Commands::try_parse_from(["wgwarden", "--log-format", "json", "peers"]).unwrap();
        let options = args.log_options();
        assert_eq!(options.format, LogFormat::Json);
        assert!(options.quiet_console);

        let args = Commands::try_parse_from(["wgwarden", "run", "--log-dir", "/tmp/wglogs"]).unwrap();
        let options = args.log_options();
        assert!(!options.quiet_console);
        assert_eq!(options.dir, Some(PathBuf::from("/tmp/wglogs")));
    }

    #[test]
    fn test_delete_requires_name() {
        assert!(Commands::try_parse_from(["wgwarden", "delete"]).is_err());
    }
}
