//! Shared monitor state: the latest complete process snapshot.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::types::Snapshot;

/// Holds the visible snapshot. Installs swap an `Arc`, reads clone one, so
/// neither side holds the lock for more than a pointer copy.
#[derive(Clone, Default)]
pub struct SnapshotStore {
    current: Arc<RwLock<Arc<Snapshot>>>,
    installs: Arc<AtomicU64>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the visible snapshot as a whole.
    pub fn install(&self, snapshot: Snapshot) {
        let next = Arc::new(snapshot);
        *self.current.write() = next;
        self.installs.fetch_add(1, Ordering::Release);
    }

    /// Current complete snapshot (empty before the first install).
    pub fn read(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Number of installs so far.
    pub fn installs(&self) -> u64 {
        self.installs.load(Ordering::Acquire)
    }
}
