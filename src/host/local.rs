//! Host channel for a bot running on the WireGuard host itself.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;

use super::channel::{temp_path_for, CommandOutput, HostChannel, HostCommand};
use crate::error::{Error, Result};

/// Runs commands as local subprocesses and touches files directly.
#[derive(Debug, Default, Clone)]
pub struct LocalHost;

impl LocalHost {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl HostChannel for LocalHost {
    fn describe(&self) -> String {
        "local".to_string()
    }

    async fn exec(&self, command: &HostCommand) -> Result<CommandOutput> {
        tracing::debug!("exec (local): {}", command);
        let output = TokioCommand::new(&command.program)
            .args(&command.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::command(command.to_string(), e.to_string()))?;
        Ok(output.into())
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write_file_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        let tmp = temp_path_for(path);

        let write = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(contents.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);

            // Keep the mode of the file being replaced (wg0.conf is usually 0600).
            if let Ok(meta) = tokio::fs::metadata(path).await {
                tokio::fs::set_permissions(&tmp, meta.permissions()).await?;
            }
            tokio::fs::rename(&tmp, path).await
        };

        if let Err(e) = write.await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(e.into());
        }

        tracing::debug!("Replaced {}", path.display());
        Ok(())
    }

    async fn file_exists(&self, path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn remove_file(&self, path: &Path) -> Result<bool> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_dir(&self, dir: &Path) -> Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_atomic_write_replaces_contents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("wg0.conf");
        std::fs::write(&path, "old\n").unwrap();

        let host = LocalHost::new();
        host.write_file_atomic(&path, "new\n").await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
        assert!(!temp_path_for(&path).exists());
    }

    #[tokio::test]
    async fn test_remove_and_exists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("alice.conf");
        std::fs::write(&path, "x").unwrap();

        let host = LocalHost::new();
        assert!(host.file_exists(&path).await.unwrap());
        assert!(host.remove_file(&path).await.unwrap());
        assert!(!host.file_exists(&path).await.unwrap());
        assert!(!host.remove_file(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_dir_files_only() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("b.conf"), "").unwrap();
        std::fs::write(temp_dir.path().join("a.conf"), "").unwrap();
        std::fs::create_dir(temp_dir.path().join("sub")).unwrap();

        let names = LocalHost::new().list_dir(temp_dir.path()).await.unwrap();
        assert_eq!(names, vec!["a.conf".to_string(), "b.conf".to_string()]);
    }

    #[tokio::test]
    async fn test_exec_reports_exit_code() {
        let host = LocalHost::new();
        let ok = host.exec(&HostCommand::new("sh").args(["-c", "echo hi"])).await.unwrap();
        assert!(ok.success());
        assert_eq!(ok.stdout.trim(), "hi");

        let failed = host.exec(&HostCommand::new("sh").args(["-c", "exit 3"])).await.unwrap();
        assert_eq!(failed.code, Some(3));
    }
}
