//! Host channel over the system OpenSSH client.
//!
//! One multiplexed connection (ControlMaster) is shared by every call. The
//! channel tracks its own state and reconnects under a [`RetryPolicy`] when
//! it is not connected.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::sync::{Mutex, MutexGuard};

use super::channel::{shell_quote, temp_path_for, CommandOutput, HostChannel, HostCommand};
use super::retry::RetryPolicy;
use crate::config::SshConfig;
use crate::error::{Error, Result};

/// Exit code ssh uses for its own (transport) errors.
const SSH_TRANSPORT_ERROR: i32 = 255;

/// How long the master connection lingers after the last command.
const CONTROL_PERSIST_SECS: u64 = 600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connected,
    Failed(String),
}

#[derive(Debug, Clone)]
struct SshTarget {
    host: String,
    port: u16,
    username: String,
    password: Option<String>,
    identity_file: Option<PathBuf>,
    connect_timeout_secs: u64,
    control_path: PathBuf,
}

impl SshTarget {
    fn destination(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

pub struct SshHost {
    target: SshTarget,
    retry: RetryPolicy,
    state: Mutex<ChannelState>,
}

impl SshHost {
    pub fn new(config: &SshConfig, retry: RetryPolicy) -> Result<Self> {
        let host = config
            .host
            .clone()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| Error::Config("host.ssh.host is not set".to_string()))?;
        let username = config
            .username
            .clone()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Config("host.ssh.username is not set".to_string()))?;
        let control_dir = config
            .control_dir
            .clone()
            .unwrap_or_else(std::env::temp_dir);

        Ok(Self {
            target: SshTarget {
                host,
                port: config.port,
                username,
                password: config.password.clone().filter(|p| !p.is_empty()),
                identity_file: config.identity_file.clone(),
                connect_timeout_secs: config.connect_timeout_secs,
                control_path: control_dir.join("wgwarden-%C"),
            },
            retry,
            state: Mutex::new(ChannelState::Disconnected),
        })
    }

    pub async fn state(&self) -> ChannelState {
        self.state.lock().await.clone()
    }

    /// ssh (or sshpass wrapping ssh) with all connection options applied.
    fn ssh_command(&self) -> TokioCommand {
        let t = &self.target;
        let mut cmd = match &t.password {
            Some(password) => {
                let mut cmd = TokioCommand::new("sshpass");
                cmd.arg("-e").arg("ssh").env("SSHPASS", password);
                cmd
            }
            None => {
                let mut cmd = TokioCommand::new("ssh");
                cmd.args(["-o", "BatchMode=yes"]);
                cmd
            }
        };

        cmd.arg("-p").arg(t.port.to_string());
        if let Some(identity) = &t.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.arg("-o")
            .arg(format!("ConnectTimeout={}", t.connect_timeout_secs))
            .args(["-o", "StrictHostKeyChecking=accept-new"])
            .args(["-o", "ControlMaster=auto"])
            .arg("-o")
            .arg(format!("ControlPath={}", t.control_path.display()))
            .arg("-o")
            .arg(format!("ControlPersist={}", CONTROL_PERSIST_SECS))
            .args(["-o", "ServerAliveInterval=15"])
            .args(["-o", "ServerAliveCountMax=3"])
            .args(["-o", "LogLevel=ERROR"]);
        cmd.kill_on_drop(true);
        cmd
    }

    async fn run_raw(&self, remote: &str, input: Option<&str>) -> Result<CommandOutput> {
        let mut cmd = self.ssh_command();
        cmd.arg(self.target.destination())
            .arg(remote)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| Error::Connection(format!("failed to start ssh: {}", e)))?;

        if let Some(input) = input {
            if let Some(mut stdin) = child.stdin.take() {
                stdin.write_all(input.as_bytes()).await?;
                stdin.shutdown().await?;
            }
        }

        let output = child.wait_with_output().await?;
        Ok(output.into())
    }

    async fn connect_once(&self) -> Result<()> {
        let output = self.run_raw("true", None).await?;
        if output.success() {
            Ok(())
        } else {
            Err(Error::Connection(format!(
                "{}: {}",
                self.describe(),
                output.failure_message()
            )))
        }
    }

    /// Acquire the connection, connecting first when needed.
    async fn session(&self) -> Result<Session<'_>> {
        let mut state = self.state.lock().await;
        if *state != ChannelState::Connected {
            tracing::info!("Connecting to {}", self.describe());
            match self.retry.run("ssh connect", |_| self.connect_once()).await {
                Ok(()) => {
                    tracing::info!("Connected to {}", self.describe());
                    *state = ChannelState::Connected;
                }
                Err(e) => {
                    *state = ChannelState::Failed(e.to_string());
                    return Err(e);
                }
            }
        }
        Ok(Session { host: self, state })
    }
}

/// Exclusive use of the shared connection for the duration of one call.
struct Session<'a> {
    host: &'a SshHost,
    state: MutexGuard<'a, ChannelState>,
}

impl Session<'_> {
    async fn run(&mut self, remote: &str, input: Option<&str>) -> Result<CommandOutput> {
        tracing::debug!("exec ({}): {}", self.host.describe(), remote);
        match self.host.run_raw(remote, input).await {
            Ok(output) if output.code == Some(SSH_TRANSPORT_ERROR) => {
                let reason = output.failure_message();
                tracing::warn!("Connection to {} lost: {}", self.host.describe(), reason);
                *self.state = ChannelState::Failed(reason.clone());
                Err(Error::Connection(reason))
            }
            Ok(output) => Ok(output),
            Err(e) => {
                *self.state = ChannelState::Failed(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_checked(&mut self, remote: &str, input: Option<&str>) -> Result<String> {
        let output = self.run(remote, input).await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(Error::command(remote, output.failure_message()))
        }
    }
}

fn quote_path(path: &Path) -> String {
    shell_quote(&path.to_string_lossy())
}

#[async_trait]
impl HostChannel for SshHost {
    fn describe(&self) -> String {
        format!("{}:{}", self.target.destination(), self.target.port)
    }

    async fn exec(&self, command: &HostCommand) -> Result<CommandOutput> {
        self.session().await?.run(&command.to_shell(), None).await
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        let remote = format!("cat -- {}", quote_path(path));
        self.session().await?.run_checked(&remote, None).await
    }

    async fn write_file_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        let tmp = quote_path(&temp_path_for(path));
        let remote = format!(
            "umask 077 && cat > {tmp} && mv -f -- {tmp} {dst}",
            tmp = tmp,
            dst = quote_path(path)
        );
        self.session().await?.run_checked(&remote, Some(contents)).await?;
        Ok(())
    }

    async fn file_exists(&self, path: &Path) -> Result<bool> {
        let remote = format!("test -e {}", quote_path(path));
        let output = self.session().await?.run(&remote, None).await?;
        match output.code {
            Some(0) => Ok(true),
            Some(1) => Ok(false),
            _ => Err(Error::command(remote, output.failure_message())),
        }
    }

    async fn remove_file(&self, path: &Path) -> Result<bool> {
        let p = quote_path(path);
        let remote = format!("if [ -e {p} ]; then rm -f -- {p} && echo removed; fi", p = p);
        let stdout = self.session().await?.run_checked(&remote, None).await?;
        Ok(stdout.trim() == "removed")
    }

    async fn list_dir(&self, dir: &Path) -> Result<Vec<String>> {
        let remote = format!(
            "find {} -maxdepth 1 -type f -printf '%f\\n'",
            quote_path(dir)
        );
        let stdout = self.session().await?.run_checked(&remote, None).await?;
        let mut names: Vec<String> = stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        names.sort();
        Ok(names)
    }

    async fn close(&self) {
        let mut state = self.state.lock().await;
        if *state == ChannelState::Connected {
            let mut cmd = self.ssh_command();
            cmd.args(["-O", "exit"])
                .arg(self.target.destination())
                .stdin(Stdio::null())
                .stdout(Stdio::null())
                .stderr(Stdio::null());
            if let Err(e) = cmd.status().await {
                tracing::warn!("Failed to close ssh master for {}: {}", self.describe(), e);
            }
            tracing::info!("Disconnected from {}", self.describe());
        }
        *state = ChannelState::Disconnected;
    }
}
