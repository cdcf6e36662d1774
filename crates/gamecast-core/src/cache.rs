//! Single-slot latest-value cache between the producer and the broadcaster.
//!
//! The host writes a fresh [`Snapshot`] every tick; the broadcast loop
//! reads whatever is newest at its own cadence. There is no queue: a write
//! replaces the held value, so samples taken faster than they are
//! broadcast simply coalesce and memory stays bounded at one payload.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::snapshot::Snapshot;

/// Holder for the most recent snapshot.
///
/// Both [`set`](Self::set) and [`get`](Self::get) hold the slot lock only
/// long enough to swap or clone an [`Arc`](std::sync::Arc), so neither
/// side waits on the other for longer than a pointer copy.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    slot: Mutex<Option<Snapshot>>,
    version: AtomicU64,
}

impl SnapshotCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the held snapshot unconditionally (last write wins).
    pub fn set(&self, snapshot: Snapshot) {
        let previous = {
            let mut slot = self.slot.lock();
            slot.replace(snapshot)
        };
        self.version.fetch_add(1, Ordering::Release);
        // The old payload is released outside the lock.
        drop(previous);
    }

    /// The most recently set snapshot, or `None` before the first `set`.
    pub fn get(&self) -> Option<Snapshot> {
        self.slot.lock().clone()
    }

    /// Whether nothing has been set yet.
    pub fn is_empty(&self) -> bool {
        self.slot.lock().is_none()
    }

    /// Number of writes accepted so far.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
