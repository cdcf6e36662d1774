//! Error types for the broadcast server.
//!
//! [`ServerError`] covers lifecycle failures surfaced to the owning
//! process. [`RequestError`] covers rejected HTTP requests and converts
//! into an Axum response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use gamecast_core::config::ConfigError;

/// Errors that can occur when starting or running the broadcast server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configured address is unusable.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The listener failed while serving.
    #[error("serve error: {0}")]
    Serve(String),

    /// `start` was called on a server that is already running.
    #[error("server already started")]
    AlreadyStarted,

    /// `start` was called on a server that has been stopped.
    #[error("server has been stopped and cannot be restarted")]
    Stopped,
}

/// Reasons a plain HTTP request is turned away.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    /// The request hit the WebSocket path without a valid upgrade.
    #[error("expected a WebSocket upgrade: {0}")]
    NotUpgrade(String),

    /// The request hit a path that serves nothing.
    #[error("no WebSocket endpoint at {0}")]
    UnknownPath(String),

    /// The server is shutting down and accepts no new clients.
    #[error("server is shutting down")]
    ShuttingDown,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotUpgrade(_) | Self::UnknownPath(_) => StatusCode::BAD_REQUEST,
            Self::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (
            status,
            [(header::CONNECTION, "close")],
            axum::Json(body),
        )
            .into_response()
    }
}
