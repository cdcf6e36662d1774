//! WebSocket transport for a connected client.
//!
//! The write half of each accepted socket is wrapped in a [`WsClient`],
//! which is what the registry holds and the broadcast loop sends to.
//! Writes go through a per-client async mutex, so an eviction close and
//! a broadcast send never interleave frames and snapshots to one client
//! arrive in send order. The monitor task only reads.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::future::BoxFuture;
use futures::stream::SplitSink;
use futures::{FutureExt as _, SinkExt as _};
use gamecast_core::{ClientSink, SendError, Snapshot};
use gamecast_types::ClientId;
use tokio::sync::Mutex;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::trace;

use crate::frame::FrameCache;

/// Write half of an accepted WebSocket connection.
pub struct WsClient {
    id: ClientId,
    sink: Mutex<SplitSink<WebSocket, Message>>,
    closed: CancellationToken,
    frames: Arc<FrameCache>,
}

impl WsClient {
    /// Wrap a socket's write half. `closed` is cancelled once the client
    /// is closed, by either side. Payloads are taken from `frames`, which
    /// every client of one server shares.
    pub fn new(
        id: ClientId,
        sink: SplitSink<WebSocket, Message>,
        closed: CancellationToken,
        frames: Arc<FrameCache>,
    ) -> Self {
        Self {
            id,
            sink: Mutex::new(sink),
            closed,
            frames,
        }
    }

    /// The client's identifier.
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Whether the client has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the client is closed.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closed.cancelled()
    }

    async fn write(&self, message: Message) -> Result<(), SendError> {
        if self.closed.is_cancelled() {
            return Err(SendError::Closed);
        }

        let mut sink = self.sink.lock().await;
        match sink.send(message).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.closed.cancel();
                Err(SendError::Transport {
                    message: e.to_string(),
                })
            }
        }
    }
}

impl std::fmt::Debug for WsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsClient")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl ClientSink for WsClient {
    fn send<'a>(&'a self, snapshot: &'a Snapshot) -> BoxFuture<'a, Result<(), SendError>> {
        let frame = Message::Text(self.frames.frame(snapshot));
        self.write(frame).boxed()
    }

    fn close(&self) -> BoxFuture<'_, ()> {
        async move {
            self.closed.cancel();
            let mut sink = self.sink.lock().await;
            // Fails harmlessly when the close handshake already happened.
            if let Err(e) = sink.close().await {
                trace!(client = %self.id, error = %e, "Close after disconnect");
            }
        }
        .boxed()
    }
}
