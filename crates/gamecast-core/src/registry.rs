//! Registry of currently connected clients.
//!
//! Two independent paths can discover that a client is gone: the
//! broadcast loop (a failed send) and the client's own receive monitor (a
//! close frame or EOF). Both call [`ClientRegistry::remove`], which is
//! idempotent, so neither path has to coordinate with the other.
//!
//! The broadcast loop never iterates the live map. It takes a
//! [`snapshot`](ClientRegistry::snapshot) and performs all I/O after the
//! lock is released, so a slow client never blocks new connections or
//! the removal of other dead ones.

use std::collections::BTreeMap;
use std::sync::Arc;

use gamecast_types::ClientId;
use parking_lot::Mutex;

use crate::sink::ClientSink;

/// Shared handle to a registered client.
pub type SharedSink = Arc<dyn ClientSink>;

/// Concurrent-safe set of connected clients keyed by [`ClientId`].
#[derive(Default)]
pub struct ClientRegistry {
    clients: Mutex<BTreeMap<ClientId, SharedSink>>,
}

impl ClientRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client. Returns the number of clients afterwards.
    ///
    /// Re-adding an existing ID replaces its sink.
    pub fn add(&self, id: ClientId, sink: SharedSink) -> usize {
        let mut clients = self.clients.lock();
        clients.insert(id, sink);
        clients.len()
    }

    /// Remove a client, returning its sink if it was still registered.
    ///
    /// Removing an absent client is a no-op that returns `None`.
    pub fn remove(&self, id: ClientId) -> Option<SharedSink> {
        self.clients.lock().remove(&id)
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.lock().contains_key(&id)
    }

    /// Point-in-time copy of all clients, ordered by ID (connection order).
    pub fn snapshot(&self) -> Vec<(ClientId, SharedSink)> {
        self.clients
            .lock()
            .iter()
            .map(|(id, sink)| (*id, Arc::clone(sink)))
            .collect()
    }

    /// Remove and return every client.
    pub fn drain(&self) -> Vec<(ClientId, SharedSink)> {
        let taken = std::mem::take(&mut *self.clients.lock());
        taken.into_iter().collect()
    }

    /// Number of registered clients.
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// Whether no clients are registered.
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.len())
            .finish()
    }
}
