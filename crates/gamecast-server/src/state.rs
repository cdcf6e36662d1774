//! Shared application state for the broadcast server.
//!
//! [`AppState`] is injected into every handler through Axum's `State`
//! extractor. It bundles the two pieces of shared mutable data (the
//! snapshot cache and the client registry) with the server-wide
//! cancellation token, the tracker for per-client tasks, and the frame
//! cache that lets every client share one encoded payload.

use std::sync::Arc;

use gamecast_core::{ClientRegistry, SnapshotCache};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::frame::FrameCache;

/// Shared state for the Axum application.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Latest snapshot written by the host.
    pub cache: Arc<SnapshotCache>,
    /// Currently connected clients.
    pub registry: Arc<ClientRegistry>,
    /// Cancelled when the server stops; every loop observes it.
    pub shutdown: CancellationToken,
    /// Tracks per-client monitor tasks and eviction closes so shutdown
    /// can wait for them.
    pub tracker: TaskTracker,
    /// Encoded payload of the snapshot being broadcast.
    pub frames: Arc<FrameCache>,
    /// Path that accepts WebSocket upgrades.
    pub ws_path: String,
}

impl AppState {
    /// Create state around an existing cache with an empty registry.
    pub fn new(cache: Arc<SnapshotCache>, ws_path: impl Into<String>) -> Self {
        Self {
            cache,
            registry: Arc::new(ClientRegistry::new()),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
            frames: Arc::new(FrameCache::new()),
            ws_path: ws_path.into(),
        }
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.registry.len()
    }
}
