//! WireGuard host state: live status, the daemon config and client files.

pub mod clients;
pub mod document;
pub mod service;
pub mod status;

pub use clients::{validate_client_name, ClientDirectory, ClientFileInfo, DeleteOutcome, NotFoundReason};
pub use document::{ClientBlock, ConfigDocument};
pub use service::reload_interface;
pub use status::{parse_status, query_peers, query_status, PeerRecord};
