//! Snapshot differencing: which keys are new since the last observation.

use std::collections::HashSet;

/// Keys in `current` that are not in `previous`.
pub fn diff(previous: &HashSet<String>, current: &HashSet<String>) -> HashSet<String> {
    current.difference(previous).cloned().collect()
}

/// Remembers the last successful snapshot.
///
/// Only successful observations move the baseline; a failed poll is simply
/// not observed. The first observation is silent unless `notify_on_startup`.
#[derive(Debug, Clone, Default)]
pub struct SnapshotDiffer {
    previous: HashSet<String>,
    has_baseline: bool,
    notify_on_startup: bool,
}

impl SnapshotDiffer {
    pub fn new(notify_on_startup: bool) -> Self {
        Self {
            previous: HashSet::new(),
            has_baseline: false,
            notify_on_startup,
        }
    }

    /// Record a snapshot and return the keys to announce.
    pub fn observe(&mut self, current: HashSet<String>) -> HashSet<String> {
        let new = if self.has_baseline || self.notify_on_startup {
            diff(&self.previous, &current)
        } else {
            tracing::debug!("Baseline established with {} key(s)", current.len());
            HashSet::new()
        };
        self.previous = current;
        self.has_baseline = true;
        new
    }

    pub fn known(&self) -> &HashSet<String> {
        &self.previous
    }

    pub fn has_baseline(&self) -> bool {
        self.has_baseline
    }
}
