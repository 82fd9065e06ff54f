//! Parsing of `wg show` output into peer records.
//!
//! Output shape:
//!
//! ```text
//! interface: wg0
//!   public key: ...
//!
//! peer: AAAA...
//!   endpoint: 203.0.113.7:51820
//!   latest handshake: 5 seconds ago
//!   transfer: 10 KiB received, 2 KiB sent
//! ```

use crate::error::Result;
use crate::host::{HostChannel, HostCommand};

pub const PEER_MARKER: &str = "peer:";
const INTERFACE_MARKER: &str = "interface:";

pub const LATEST_HANDSHAKE: &str = "latest handshake";
pub const TRANSFER: &str = "transfer";
pub const ENDPOINT: &str = "endpoint";
pub const ALLOWED_IPS: &str = "allowed ips";

/// One peer as reported by the daemon. Rebuilt on every poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub public_key: String,
    /// `key: value` pairs in the order reported.
    pub attributes: Vec<(String, String)>,
}

impl PeerRecord {
    pub fn new(public_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            attributes: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Later values for the same key replace earlier ones.
    pub fn set(&mut self, key: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.attributes.push((key.to_string(), value.to_string())),
        }
    }

    pub fn latest_handshake(&self) -> Option<&str> {
        self.get(LATEST_HANDSHAKE)
    }

    pub fn transfer(&self) -> Option<&str> {
        self.get(TRANSFER)
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.get(ENDPOINT)
    }

    pub fn allowed_ips(&self) -> Option<&str> {
        self.get(ALLOWED_IPS)
    }
}

/// Parse status text into records, in first-seen order.
///
/// Lines before the first peer marker and lines without a `:` are skipped.
/// An `interface:` header closes the current peer. A `peer:` marker with no
/// key closes the current peer but opens no record, and its attribute lines
/// are skipped: a peer without a key cannot be diffed or named.
pub fn parse_status(output: &str) -> Vec<PeerRecord> {
    let mut records = Vec::new();
    let mut current: Option<PeerRecord> = None;

    for line in output.lines() {
        if let Some(rest) = line.strip_prefix(PEER_MARKER) {
            records.extend(current.take());
            let key = rest.trim();
            if !key.is_empty() {
                current = Some(PeerRecord::new(key));
            }
        } else if line.starts_with(INTERFACE_MARKER) {
            records.extend(current.take());
        } else if let Some(record) = current.as_mut() {
            if let Some((key, value)) = line.trim().split_once(':') {
                let key = key.trim();
                if !key.is_empty() {
                    record.set(key, value.trim());
                }
            }
        }
    }
    records.extend(current);

    records
}

/// `wg show <interface>`.
pub fn status_command(interface: &str) -> HostCommand {
    HostCommand::new("wg").args(["show", interface])
}

/// Raw status text for the interface.
pub async fn query_status(host: &dyn HostChannel, interface: &str) -> Result<String> {
    host.exec_checked(&status_command(interface)).await
}

/// Current peers on the interface.
pub async fn query_peers(host: &dyn HostChannel, interface: &str) -> Result<Vec<PeerRecord>> {
    let output = query_status(host, interface).await?;
    let peers = parse_status(&output);
    tracing::debug!("Status query returned {} peer(s)", peers.len());
    Ok(peers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_peers() {
        let output = "peer: AAAA\n  latest handshake: 5 seconds ago\n  transfer: 10 KiB\npeer: BBBB\n  latest handshake: 1 minute ago\n  transfer: 2 KiB";
        let peers = parse_status(output);

        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].public_key, "AAAA");
        assert_eq!(peers[0].latest_handshake(), Some("5 seconds ago"));
        assert_eq!(peers[0].transfer(), Some("10 KiB"));
        assert_eq!(peers[1].public_key, "BBBB");
        assert_eq!(peers[1].latest_handshake(), Some("1 minute ago"));
        assert_eq!(peers[1].transfer(), Some("2 KiB"));
    }

    #[test]
    fn test_real_wg_show_output() {
        let output = "interface: wg0\n  public key: SERVERKEY=\n  private key: (hidden)\n  listening port: 51820\n\npeer: xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=\n  endpoint: 203.0.113.7:51820\n  allowed ips: 10.0.0.2/32\n  latest handshake: 1 minute, 2 seconds ago\n  transfer: 1.21 KiB received, 3.50 KiB sent\n\npeer: TrMvSoP4jYQlY6RIzBgbssQqY3vxI2Pi+y71lOWWXX0=\n  allowed ips: 10.0.0.3/32\n";
        let peers = parse_status(output);

        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].public_key, "xTIBA5rboUvnH4htodjb6e697QjLERt1NAB4mZqp8Dg=");
        assert_eq!(peers[0].endpoint(), Some("203.0.113.7:51820"));
        assert_eq!(peers[0].allowed_ips(), Some("10.0.0.2/32"));
        assert_eq!(peers[0].latest_handshake(), Some("1 minute, 2 seconds ago"));
        assert!(peers[0].get("listening port").is_none());
        assert_eq!(peers[1].latest_handshake(), None);
        assert_eq!(peers[1].allowed_ips(), Some("10.0.0.3/32"));
    }

    #[test]
    fn test_no_peers() {
        assert!(parse_status("").is_empty());
        assert!(parse_status("interface: wg0\n  listening port: 51820\n").is_empty());
    }

    #[test]
    fn test_unparsable_lines_skipped() {
        let peers = parse_status("peer: K1\n  garbage line\n\n  transfer: 1 B\n");
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].attributes, vec![("transfer".to_string(), "1 B".to_string())]);
    }

    #[test]
    fn test_keyless_peer_marker_opens_no_record() {
        let peers = parse_status("peer: K1\n  transfer: 1 B\npeer:   \n  transfer: 9 B\npeer: K2\n");
        let keys: Vec<_> = peers.iter().map(|p| p.public_key.as_str()).collect();
        assert_eq!(keys, vec!["K1", "K2"]);
        assert_eq!(peers[0].transfer(), Some("1 B"));
        assert_eq!(peers[1].transfer(), None);
    }

    #[test]
    fn test_interface_header_ends_peer() {
        let output = "interface: wg0\npeer: K1\n  transfer: 1 B\n\ninterface: wg1\n  listening port: 51821\npeer: K2\n";
        let peers = parse_status(output);
        assert_eq!(peers.len(), 2);
        assert!(peers[0].get("listening port").is_none());
        assert_eq!(peers[1].public_key, "K2");
    }

    #[test]
    fn test_record_count_matches_markers() {
        let output: String = (0..5)
            .map(|i| format!("peer: KEY{}\n  transfer: {} B\n", i, i))
            .collect();
        let peers = parse_status(&output);
        assert_eq!(peers.len(), 5);
        for (i, peer) in peers.iter().enumerate() {
            assert_eq!(peer.public_key, format!("KEY{}", i));
            assert_eq!(peer.transfer(), Some(format!("{} B", i).as_str()));
        }
    }
}
