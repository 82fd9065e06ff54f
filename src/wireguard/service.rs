//! Interface reload via wg-quick.

use crate::error::Result;
use crate::host::{HostChannel, HostCommand};

/// Bring the interface down, then up. Both steps must succeed.
pub async fn reload_interface(host: &dyn HostChannel, interface: &str) -> Result<()> {
    tracing::info!("Reloading WireGuard interface {}", interface);

    host.exec_checked(&HostCommand::new("wg-quick").args(["down", interface]))
        .await
        .map_err(|e| {
            tracing::error!("Failed to bring {} down: {}", interface, e);
            e
        })?;

    host.exec_checked(&HostCommand::new("wg-quick").args(["up", interface]))
        .await
        .map_err(|e| {
            tracing::error!("Failed to bring {} up: {}", interface, e);
            e
        })?;

    tracing::info!("WireGuard interface {} reloaded", interface);
    Ok(())
}
