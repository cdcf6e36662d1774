//! `WebSocket` endpoint: upgrade, register, and monitor each client.
//!
//! Clients connect to the configured path (default `/`) and from then on
//! receive the latest snapshot every broadcast tick. Nothing a client
//! sends is interpreted; the read half is only watched for a close frame,
//! EOF, or a transport error, at which point the client is removed from
//! the registry and its socket closed.
//!
//! The broadcast loop may evict the same client first after a failed
//! send. Removal is idempotent, so whichever path notices first wins and
//! the other is a no-op.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use futures::stream::SplitStream;
use futures::StreamExt as _;
use gamecast_core::ClientSink as _;
use gamecast_types::ClientId;
use tracing::{debug, info};

use crate::client::WsClient;
use crate::error::RequestError;
use crate::state::AppState;

/// Upper bound on closing a socket once its monitor exits.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Upgrade an HTTP request to a `WebSocket` connection and register the
/// client for snapshot broadcasts.
///
/// Requests that are not valid upgrades get `400 Bad Request`.
pub async fn ws_handler(
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => {
            debug!(%rejection, "Rejected non-upgrade request");
            return RequestError::NotUpgrade(rejection.body_text()).into_response();
        }
    };

    if state.shutdown.is_cancelled() {
        return RequestError::ShuttingDown.into_response();
    }

    let tracker = state.tracker.clone();
    upgrade
        .on_failed_upgrade(|e: axum::Error| debug!(error = %e, "WebSocket upgrade failed"))
        .on_upgrade(move |socket| tracker.track_future(handle_socket(socket, state)))
}

/// Why a client's monitor loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disconnect {
    /// Peer sent a close frame.
    CloseFrame,
    /// Transport reached EOF.
    Eof,
    /// Transport or protocol error on receive.
    ReceiveError,
    /// Closed from our side (eviction or server shutdown).
    Local,
}

/// Handle the `WebSocket` lifecycle: register the write half, watch the
/// read half until the connection ends, then deregister and close.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let id = ClientId::new();
    let (sink, mut stream) = socket.split();
    let client = Arc::new(WsClient::new(
        id,
        sink,
        state.shutdown.child_token(),
        Arc::clone(&state.frames),
    ));

    let clients = state.registry.add(id, client.clone());
    info!(client = %id, clients, "WebSocket client connected");

    let reason = monitor(&mut stream, &client).await;

    // Removal first, so the next broadcast tick no longer targets it.
    state.registry.remove(id);
    if tokio::time::timeout(CLOSE_TIMEOUT, client.close()).await.is_err() {
        debug!(client = %id, "Socket close timed out");
    }

    info!(
        client = %id,
        ?reason,
        clients = state.registry.len(),
        "WebSocket client disconnected"
    );
}

async fn monitor(stream: &mut SplitStream<WebSocket>, client: &WsClient) -> Disconnect {
    loop {
        tokio::select! {
            () = client.closed() => return Disconnect::Local,
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) => return Disconnect::CloseFrame,
                    None => return Disconnect::Eof,
                    Some(Err(e)) => {
                        debug!(client = %client.id(), error = %e, "WebSocket receive error");
                        return Disconnect::ReceiveError;
                    }
                    Some(Ok(_)) => {
                        // No command channel. Pings are answered by the
                        // socket itself on the next read or flush.
                    }
                }
            }
        }
    }
}
