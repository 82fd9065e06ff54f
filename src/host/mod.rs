//! Access to the WireGuard host: local processes or a shared SSH connection.

pub mod channel;
pub mod local;
pub mod retry;
pub mod ssh;

#[cfg(test)]
pub mod memory;

use std::sync::Arc;

pub use channel::{shell_quote, temp_path_for, CommandOutput, HostChannel, HostCommand};
pub use local::LocalHost;
pub use retry::RetryPolicy;
pub use ssh::{ChannelState, SshHost};

use crate::config::{HostConfig, HostMode};
use crate::error::Result;

/// Build the channel selected by `host.mode`.
pub fn connect_from_config(config: &HostConfig) -> Result<Arc<dyn HostChannel>> {
    match config.mode {
        HostMode::Local => Ok(Arc::new(LocalHost::new())),
        HostMode::Ssh => {
            let retry = RetryPolicy::from_config(&config.retry);
            Ok(Arc::new(SshHost::new(&config.ssh, retry)?))
        }
    }
}
