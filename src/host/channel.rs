//! The host channel trait and its command/output types.

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// A program invocation on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl HostCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Render as a single line for a POSIX shell, every word quoted as needed.
    pub fn to_shell(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .map(shell_quote)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for HostCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of a command that ran to completion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Best human-readable reason for a failed command.
    pub fn failure_message(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        let stdout = self.stdout.trim();
        if !stdout.is_empty() {
            return stdout.to_string();
        }
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }
}

/// "Run this on the VPN host" and "read/write this file on the VPN host".
#[async_trait]
pub trait HostChannel: Send + Sync {
    /// Short description for logs, e.g. `local` or `root@vpn:22`.
    fn describe(&self) -> String;

    /// Run a command; a non-zero exit is still `Ok`.
    async fn exec(&self, command: &HostCommand) -> Result<CommandOutput>;

    /// Run a command and return its stdout, failing on a non-zero exit.
    async fn exec_checked(&self, command: &HostCommand) -> Result<String> {
        let output = self.exec(command).await?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(Error::command(command.to_string(), output.failure_message()))
        }
    }

    async fn read_file(&self, path: &Path) -> Result<String>;

    /// Replace `path` by writing a sibling temp file and renaming it over.
    async fn write_file_atomic(&self, path: &Path, contents: &str) -> Result<()>;

    async fn file_exists(&self, path: &Path) -> Result<bool>;

    /// Remove a file. Returns whether it existed; a missing file is not an error.
    async fn remove_file(&self, path: &Path) -> Result<bool>;

    /// File names (not paths) in a directory, sorted.
    async fn list_dir(&self, dir: &Path) -> Result<Vec<String>>;

    /// Release any held connection.
    async fn close(&self) {}
}

/// Quote a word for a POSIX shell. Plain words are returned as-is.
pub fn shell_quote(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | ':' | '=' | '@' | '%' | '+' | ','));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// `<path>.tmp`, in the same directory so the final rename stays on one filesystem.
pub fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
