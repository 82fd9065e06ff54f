//! Client directory: name lookup, client deletion and credential files.

use std::path::PathBuf;
use std::sync::Arc;

use super::document::{client_comment_name, setting_value, ConfigDocument};
use super::service::reload_interface;
use crate::config::WireguardConfig;
use crate::error::{Error, Result};
use crate::host::{HostChannel, HostCommand};

const CREDENTIAL_EXT: &str = ".conf";

/// Which existence check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// No `<name>.conf` in the clients directory.
    CredentialFile,
    /// No `# Client: <name>` block in the daemon config.
    ConfigBlock,
}

/// Result of [`ClientDirectory::delete_client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Block and credential file removed, interface reloaded.
    Removed,
    NotFound(NotFoundReason),
    /// Config block removed, but removing the credential file or reloading
    /// the interface failed.
    PartialFailure { reason: String },
}

/// What a client credential file says about its client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientFileInfo {
    pub file_name: String,
    pub path: PathBuf,
    pub created: Option<String>,
    pub client_name: String,
    pub public_key: Option<String>,
    pub allowed_ips: Option<String>,
    pub endpoint: Option<String>,
}

/// Check an operator-supplied client name. A trailing `.conf` is dropped.
pub fn validate_client_name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let name = trimmed.strip_suffix(CREDENTIAL_EXT).unwrap_or(trimmed);
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(name.to_string())
    } else {
        Err(Error::InvalidClientName(raw.to_string()))
    }
}

/// Operations on the daemon config and the clients directory of one host.
#[derive(Clone)]
pub struct ClientDirectory {
    host: Arc<dyn HostChannel>,
    config: WireguardConfig,
}

impl ClientDirectory {
    pub fn new(host: Arc<dyn HostChannel>, config: WireguardConfig) -> Self {
        Self { host, config }
    }

    pub fn host(&self) -> &dyn HostChannel {
        self.host.as_ref()
    }

    pub fn interface(&self) -> &str {
        &self.config.interface
    }

    pub fn credential_path(&self, name: &str) -> PathBuf {
        self.config
            .clients_dir
            .join(format!("{}{}", name, CREDENTIAL_EXT))
    }

    pub async fn load_document(&self) -> Result<ConfigDocument> {
        let text = self.host.read_file(&self.config.config_path).await?;
        Ok(ConfigDocument::parse(&text))
    }

    pub async fn find_client_name(&self, public_key: &str) -> Result<Option<String>> {
        Ok(self.load_document().await?.find_client_name(public_key))
    }

    /// Delete a client: its config block, then its credential file, then reload.
    ///
    /// The credential file decides whether the client exists; the config
    /// block decides what gets edited. Nothing is changed unless both exist.
    pub async fn delete_client(&self, raw_name: &str) -> Result<DeleteOutcome> {
        let name = validate_client_name(raw_name)?;
        let credential = self.credential_path(&name);

        if !self.host.file_exists(&credential).await? {
            tracing::info!("Delete {}: no credential file {}", name, credential.display());
            return Ok(DeleteOutcome::NotFound(NotFoundReason::CredentialFile));
        }

        let mut document = self.load_document().await?;
        let block = match document.remove_client_block(&name) {
            Some(block) => block,
            None => {
                tracing::info!(
                    "Delete {}: no client block in {}",
                    name,
                    self.config.config_path.display()
                );
                return Ok(DeleteOutcome::NotFound(NotFoundReason::ConfigBlock));
            }
        };

        // The config is saved before the credential file goes: a failed write
        // must leave the client deletable on the next attempt.
        self.host
            .write_file_atomic(&self.config.config_path, &document.to_string())
            .await?;
        tracing::info!(
            "Removed client {} (lines {}..{}, key {}) from {}",
            block.name,
            block.lines.start,
            block.lines.end,
            block.public_key.as_deref().unwrap_or("-"),
            self.config.config_path.display()
        );

        let mut problems = Vec::new();
        match self.host.remove_file(&credential).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!("Credential file {} vanished before removal", credential.display());
            }
            Err(e) => {
                tracing::error!("Could not remove {}: {}", credential.display(), e);
                problems.push(format!("removing {} failed: {}", credential.display(), e));
            }
        }

        if let Err(e) = reload_interface(self.host.as_ref(), &self.config.interface).await {
            tracing::error!("Reload of {} failed: {}", self.config.interface, e);
            problems.push(format!("restarting WireGuard failed: {}", e));
        }

        if problems.is_empty() {
            Ok(DeleteOutcome::Removed)
        } else {
            Ok(DeleteOutcome::PartialFailure {
                reason: problems.join("; "),
            })
        }
    }

    /// `*.conf` file names in the clients directory.
    pub async fn list_client_files(&self) -> Result<Vec<String>> {
        let names = self.host.list_dir(&self.config.clients_dir).await?;
        Ok(names
            .into_iter()
            .filter(|n| n.ends_with(CREDENTIAL_EXT))
            .collect())
    }

    /// Read a credential file and pull out what identifies its client.
    pub async fn inspect_client_file(&self, file_name: &str) -> Result<ClientFileInfo> {
        let path = self.config.clients_dir.join(file_name);
        let text = self.host.read_file(&path).await?;

        let created = match self
            .host
            .exec(&HostCommand::new("stat").args(["-c", "%y"]).arg(path.to_string_lossy()))
            .await
        {
            Ok(out) if out.success() => Some(out.stdout.trim().to_string()),
            Ok(out) => {
                tracing::debug!("stat {} failed: {}", path.display(), out.failure_message());
                None
            }
            Err(e) => {
                tracing::debug!("stat {} failed: {}", path.display(), e);
                None
            }
        };

        let mut info = parse_client_file(file_name, &text);
        info.path = path;
        info.created = created;
        Ok(info)
    }
}

/// Pull identifying fields out of a client credential file.
pub fn parse_client_file(file_name: &str, text: &str) -> ClientFileInfo {
    let stem = file_name
        .strip_suffix(CREDENTIAL_EXT)
        .unwrap_or(file_name)
        .to_string();
    let mut info = ClientFileInfo {
        file_name: file_name.to_string(),
        path: PathBuf::from(file_name),
        created: None,
        client_name: stem,
        public_key: None,
        allowed_ips: None,
        endpoint: None,
    };

    for line in text.lines() {
        if let Some(name) = client_comment_name(line) {
            info.client_name = name.to_string();
        } else if let Some(v) = setting_value(line, "PublicKey") {
            info.public_key = Some(v.to_string());
        } else if let Some(v) = setting_value(line, "AllowedIPs") {
            info.allowed_ips = Some(v.to_string());
        } else if let Some(v) = setting_value(line, "Endpoint") {
            info.endpoint = Some(v.to_string());
        }
    }
    info
}
