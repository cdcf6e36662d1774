//! Shared text frames for broadcast sends.
//!
//! Every client receives the same snapshot on a tick. [`FrameCache`]
//! converts a snapshot into a WebSocket text payload once and hands each
//! client a reference-counted clone of it.

use axum::extract::ws::Utf8Bytes;
use gamecast_core::Snapshot;
use parking_lot::Mutex;

/// The frame payload for the most recently sent snapshot.
#[derive(Debug, Default)]
pub struct FrameCache {
    last: Mutex<Option<(Snapshot, Utf8Bytes)>>,
}

impl FrameCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame payload for `snapshot`, built on the first request for it.
    pub fn frame(&self, snapshot: &Snapshot) -> Utf8Bytes {
        let mut last = self.last.lock();
        if let Some((cached, frame)) = &*last {
            if cached.same_payload(snapshot) {
                return frame.clone();
            }
        }

        let frame = Utf8Bytes::from(snapshot.as_str());
        *last = Some((snapshot.clone(), frame.clone()));
        frame
    }
}
