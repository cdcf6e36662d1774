//! The seam between the broadcast loop and a concrete client transport.
//!
//! The broadcaster only needs to push a [`Snapshot`] to a client and, on
//! eviction, close it. [`ClientSink`] captures exactly that, so the loop
//! can be driven by WebSocket clients in production and by in-memory
//! sinks in tests.

use futures::future::BoxFuture;

use crate::snapshot::Snapshot;

/// Errors a client send can fail with.
///
/// Every variant is treated as fatal for that client: it is evicted from
/// the registry. None of them affect other clients.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The connection is already closed.
    #[error("connection closed")]
    Closed,

    /// The transport reported an I/O or protocol failure.
    #[error("transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// The send did not complete within the per-send deadline.
    #[error("send timed out after {after_ms}ms")]
    TimedOut {
        /// The deadline that elapsed, in milliseconds.
        after_ms: u64,
    },
}

/// A connected client that can receive snapshots.
///
/// Implementations must deliver payloads to one client in the order
/// `send` is called.
pub trait ClientSink: Send + Sync {
    /// Send one snapshot as a single complete text message.
    fn send<'a>(&'a self, snapshot: &'a Snapshot) -> BoxFuture<'a, Result<(), SendError>>;

    /// Close the connection. Must be safe to call more than once.
    fn close(&self) -> BoxFuture<'_, ()>;
}
