//! In-memory host channel for tests: a file map plus scripted command results.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::channel::{CommandOutput, HostChannel, HostCommand};
use crate::error::{Error, Result};

#[derive(Default)]
pub struct MemoryHost {
    files: Mutex<BTreeMap<PathBuf, String>>,
    sticky: Mutex<HashMap<String, CommandOutput>>,
    queued: Mutex<HashMap<String, VecDeque<CommandOutput>>>,
    executed: Mutex<Vec<String>>,
    denied: Mutex<HashSet<PathBuf>>,
    offline: AtomicBool,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(self, path: impl Into<PathBuf>, contents: &str) -> Self {
        self.set_file(path, contents);
        self
    }

    pub fn set_file(&self, path: impl Into<PathBuf>, contents: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.into(), contents.to_string());
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        self.files.lock().unwrap().get(path.as_ref()).cloned()
    }

    /// Every later run of `command` (as rendered by `Display`) returns `output`.
    pub fn respond(&self, command: &str, output: CommandOutput) {
        self.sticky
            .lock()
            .unwrap()
            .insert(command.to_string(), output);
    }

    /// The next run of `command` returns `output`, before any sticky response.
    pub fn respond_once(&self, command: &str, output: CommandOutput) {
        self.queued
            .lock()
            .unwrap()
            .entry(command.to_string())
            .or_default()
            .push_back(output);
    }

    /// Make every call fail with a connection error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Writes and removals of `path` fail with a permission error.
    pub fn deny_writes(&self, path: impl Into<PathBuf>) {
        self.denied.lock().unwrap().insert(path.into());
    }

    pub fn allow_writes(&self, path: impl AsRef<Path>) {
        self.denied.lock().unwrap().remove(path.as_ref());
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(Error::Connection("memory host is offline".to_string()))
        } else {
            Ok(())
        }
    }

    fn check_writable(&self, path: &Path) -> Result<()> {
        if self.denied.lock().unwrap().contains(path) {
            Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("{}: permission denied", path.display()),
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl HostChannel for MemoryHost {
    fn describe(&self) -> String {
        "memory".to_string()
    }

    async fn exec(&self, command: &HostCommand) -> Result<CommandOutput> {
        self.check_online()?;
        let key = command.to_string();
        self.executed.lock().unwrap().push(key.clone());

        if let Some(output) = self
            .queued
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(VecDeque::pop_front)
        {
            return Ok(output);
        }
        Ok(self
            .sticky
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| CommandOutput::failed(127, format!("{}: command not found", key))))
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        self.check_online()?;
        self.file(path)
            .ok_or_else(|| Error::command(format!("cat {}", path.display()), "No such file or directory"))
    }

    async fn write_file_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        self.check_online()?;
        self.check_writable(path)?;
        self.set_file(path, contents);
        Ok(())
    }

    async fn file_exists(&self, path: &Path) -> Result<bool> {
        self.check_online()?;
        Ok(self.files.lock().unwrap().contains_key(path))
    }

    async fn remove_file(&self, path: &Path) -> Result<bool> {
        self.check_online()?;
        self.check_writable(path)?;
        Ok(self.files.lock().unwrap().remove(path).is_some())
    }

    async fn list_dir(&self, dir: &Path) -> Result<Vec<String>> {
        self.check_online()?;
        Ok(self
            .files
            .lock()
            .unwrap()
            .keys()
            .filter(|p| p.parent() == Some(dir))
            .filter_map(|p| p.file_name())
            .map(|n| n.to_string_lossy().to_string())
            .collect())
    }
}
