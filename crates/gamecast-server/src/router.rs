//! Axum router construction for the broadcast server.
//!
//! Only one route does anything: the configured `WebSocket` path. Every
//! other request is answered `400 Bad Request` and the connection is
//! closed, since this endpoint exists solely for duplex clients.

use std::sync::Arc;

use axum::extract::State;
use axum::http::Uri;
use axum::routing::any;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::RequestError;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the broadcast server.
///
/// - `ANY {ws_path}` -- `WebSocket` upgrade (non-upgrades get 400)
/// - everything else -- 400
pub fn build_router(state: Arc<AppState>) -> Router {
    let ws_path = state.ws_path.clone();

    Router::new()
        .route(&ws_path, any(ws::ws_handler))
        .fallback(reject_unknown_path)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn reject_unknown_path(State(state): State<Arc<AppState>>, uri: Uri) -> RequestError {
    tracing::debug!(%uri, ws_path = %state.ws_path, "Rejected request outside the WebSocket path");
    RequestError::UnknownPath(uri.path().to_owned())
}
