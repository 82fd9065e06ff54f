//! The monitor loop: poll peers, announce new ones, sleep, repeat.

use async_trait::async_trait;
use chrono::Local;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::differ::SnapshotDiffer;
use crate::config::Monitoring;
use crate::error::Result;
use crate::wireguard::{query_peers, ClientDirectory, ClientFileInfo, PeerRecord};

/// Something the operator should hear about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    NewPeer {
        peer: PeerRecord,
        client_name: Option<String>,
        detected_at: String,
    },
    NewClientFile {
        info: ClientFileInfo,
        detected_at: String,
    },
}

/// Delivers events to the operator.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &Event) -> Result<()>;
}

fn now_stamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

pub struct Monitor {
    directory: ClientDirectory,
    notifier: Arc<dyn Notifier>,
    interval: Duration,
    peers: SnapshotDiffer,
    client_files: Option<SnapshotDiffer>,
}

impl Monitor {
    pub fn new(directory: ClientDirectory, monitoring: &Monitoring, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            directory,
            notifier,
            interval: monitoring.poll_interval(),
            peers: SnapshotDiffer::new(monitoring.notify_on_startup),
            client_files: monitoring
                .watch_client_files
                .then(|| SnapshotDiffer::new(monitoring.notify_on_startup)),
        }
    }

    /// Current peers, or the error that prevented the query.
    pub async fn poll(&self) -> Result<Vec<PeerRecord>> {
        query_peers(self.directory.host(), self.directory.interface()).await
    }

    /// One monitoring cycle. Returns how many notifications were sent.
    ///
    /// A failed peer poll returns the error and leaves the baseline as it was.
    pub async fn tick(&mut self) -> Result<usize> {
        let mut sent = 0;

        if self.client_files.is_some() {
            match self.check_client_files().await {
                Ok(n) => sent += n,
                Err(e) => tracing::warn!("Client file check failed: {}", e),
            }
        }

        let peers = self.poll().await?;
        let current: HashSet<String> = peers.iter().map(|p| p.public_key.clone()).collect();
        let new = self.peers.observe(current);
        tracing::debug!("{} peer(s) connected", self.peers.known().len());
        if new.is_empty() {
            return Ok(sent);
        }

        tracing::info!("{} new peer(s) connected", new.len());

        // One read of the config serves every lookup in this cycle.
        let document = match self.directory.load_document().await {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!("Could not read config for client names: {}", e);
                None
            }
        };

        for peer in peers.into_iter().filter(|p| new.contains(&p.public_key)) {
            let client_name = document
                .as_ref()
                .and_then(|doc| doc.find_client_name(&peer.public_key));
            let event = Event::NewPeer {
                peer,
                client_name,
                detected_at: now_stamp(),
            };
            if self.deliver(&event).await {
                sent += 1;
            }
        }

        Ok(sent)
    }

    async fn check_client_files(&mut self) -> Result<usize> {
        let files = self.directory.list_client_files().await?;
        let Some(differ) = self.client_files.as_mut() else {
            return Ok(0);
        };

        let mut new: Vec<String> = differ.observe(files.into_iter().collect()).into_iter().collect();
        new.sort();

        let mut sent = 0;
        for file_name in new {
            match self.directory.inspect_client_file(&file_name).await {
                Ok(info) => {
                    let event = Event::NewClientFile {
                        info,
                        detected_at: now_stamp(),
                    };
                    if self.deliver(&event).await {
                        sent += 1;
                    }
                }
                Err(e) => tracing::warn!("Could not inspect new client file {}: {}", file_name, e),
            }
        }
        Ok(sent)
    }

    async fn deliver(&self, event: &Event) -> bool {
        match self.notifier.notify(event).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send notification: {}", e);
                false
            }
        }
    }

    /// Poll forever on the configured interval.
    pub async fn run(mut self) {
        tracing::info!("Monitor started (interval {:?})", self.interval);
        loop {
            match self.tick().await {
                Ok(sent) => tracing::debug!("Monitor cycle done, {} notification(s)", sent),
                Err(e) if self.peers.has_baseline() => {
                    tracing::warn!("Peer poll failed, keeping previous baseline: {}", e)
                }
                Err(e) => tracing::warn!("Peer poll failed before any baseline: {}", e),
            }
            sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WireguardConfig;
    use crate::host::memory::MemoryHost;
    use crate::host::{CommandOutput, HostChannel};
    use std::path::Path;
    use std::sync::Mutex;

    const WG_SHOW: &str = "wg show wg0";
    const WG0: &str = "# Client: alice\n[Peer]\nPublicKey = PKA\n\n# Client: bob\n[Peer]\nPublicKey = PKB\n";

    #[derive(Default)]
    struct RecordingNotifier {
        events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, event: &Event) -> Result<()> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    impl RecordingNotifier {
        fn take(&self) -> Vec<Event> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    fn status(keys: &[&str]) -> CommandOutput {
        let text: String = keys
            .iter()
            .map(|k| format!("peer: {}\n  latest handshake: 3 seconds ago\n  transfer: 1 KiB received, 2 KiB sent\n", k))
            .collect();
        CommandOutput::ok(format!("interface: wg0\n  listening port: 51820\n\n{}", text))
    }

    fn setup(monitoring: Monitoring) -> (Arc<MemoryHost>, Arc<RecordingNotifier>, Monitor) {
        let host = Arc::new(MemoryHost::new().with_file("/etc/wireguard/wg0.conf", WG0));
        let notifier = Arc::new(RecordingNotifier::default());
        let directory = ClientDirectory::new(host.clone(), WireguardConfig::default());
        let monitor = Monitor::new(directory, &monitoring, notifier.clone());
        (host, notifier, monitor)
    }

    fn new_peer_keys(events: &[Event]) -> Vec<String> {
        events
            .iter()
            .filter_map(|e| match e {
                Event::NewPeer { peer, .. } => Some(peer.public_key.clone()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_new_peer_after_baseline() {
        let (host, notifier, mut monitor) = setup(Monitoring::default());

        host.respond_once(WG_SHOW, status(&["PKA"]));
        assert_eq!(monitor.tick().await.unwrap(), 0);

        host.respond_once(WG_SHOW, status(&["PKA", "PKB"]));
        assert_eq!(monitor.tick().await.unwrap(), 1);

        let events = notifier.take();
        match &events[0] {
            Event::NewPeer { peer, client_name, .. } => {
                assert_eq!(peer.public_key, "PKB");
                assert_eq!(peer.latest_handshake(), Some("3 seconds ago"));
                assert_eq!(client_name.as_deref(), Some("bob"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_poll_keeps_baseline() {
        let (host, notifier, mut monitor) = setup(Monitoring::default());

        host.respond_once(WG_SHOW, status(&["PKA", "PKB"]));
        monitor.tick().await.unwrap();

        host.respond_once(WG_SHOW, CommandOutput::failed(1, "Unable to access interface"));
        assert!(monitor.tick().await.is_err());

        host.set_offline(true);
        assert!(monitor.tick().await.is_err());
        host.set_offline(false);

        host.respond_once(WG_SHOW, status(&["PKA", "PKB"]));
        assert_eq!(monitor.tick().await.unwrap(), 0);
        assert!(notifier.take().is_empty());
    }

    #[tokio::test]
    async fn test_reconnecting_peer_is_new_again() {
        let (host, notifier, mut monitor) = setup(Monitoring::default());

        host.respond_once(WG_SHOW, status(&["PKA"]));
        monitor.tick().await.unwrap();
        host.respond_once(WG_SHOW, status(&[]));
        monitor.tick().await.unwrap();
        host.respond_once(WG_SHOW, status(&["PKA"]));
        monitor.tick().await.unwrap();

        assert_eq!(new_peer_keys(&notifier.take()), vec!["PKA".to_string()]);
    }

    #[tokio::test]
    async fn test_notify_on_startup() {
        let monitoring = Monitoring {
            notify_on_startup: true,
            ..Monitoring::default()
        };
        let (host, notifier, mut monitor) = setup(monitoring);

        host.respond_once(WG_SHOW, status(&["PKA", "UNNAMED"]));
        assert_eq!(monitor.tick().await.unwrap(), 2);

        let events = notifier.take();
        assert_eq!(new_peer_keys(&events), vec!["PKA".to_string(), "UNNAMED".to_string()]);
        match &events[1] {
            Event::NewPeer { client_name, .. } => assert!(client_name.is_none()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_config_still_notifies() {
        let (host, notifier, mut monitor) = setup(Monitoring::default());
        host.respond_once(WG_SHOW, status(&[]));
        monitor.tick().await.unwrap();

        host.remove_file(Path::new("/etc/wireguard/wg0.conf")).await.unwrap();
        host.respond_once(WG_SHOW, status(&["PKA"]));
        assert_eq!(monitor.tick().await.unwrap(), 1);
        assert_eq!(new_peer_keys(&notifier.take()), vec!["PKA".to_string()]);
    }

    #[tokio::test]
    async fn test_client_file_watch() {
        let monitoring = Monitoring {
            watch_client_files: true,
            ..Monitoring::default()
        };
        let (host, notifier, mut monitor) = setup(monitoring);
        host.respond(WG_SHOW, status(&[]));
        host.set_file("/etc/wireguard/clients/alice.conf", "# Client: alice\n");

        monitor.tick().await.unwrap();
        assert!(notifier.take().is_empty());

        host.set_file(
            "/etc/wireguard/clients/phone.conf",
            "[Peer]\nPublicKey = SERVERPUB\nAllowedIPs = 0.0.0.0/0\n",
        );
        assert_eq!(monitor.tick().await.unwrap(), 1);

        match &notifier.take()[0] {
            Event::NewClientFile { info, .. } => {
                assert_eq!(info.client_name, "phone");
                assert_eq!(info.allowed_ips.as_deref(), Some("0.0.0.0/0"));
                assert!(info.created.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
