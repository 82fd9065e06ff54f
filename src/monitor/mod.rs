//! Background monitoring of the WireGuard host.

pub mod daemon;
pub mod differ;

pub use daemon::{Event, Monitor, Notifier};
pub use differ::{diff, SnapshotDiffer};
