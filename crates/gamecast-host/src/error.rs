//! Error types for the host binary.
//!
//! [`HostError`] is the top-level error type that wraps every failure
//! mode during plugin load and the host tick loop.

/// Top-level error for the host binary.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: gamecast_core::config::ConfigError,
    },

    /// The broadcast server failed to start, or its listener died.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: gamecast_server::ServerError,
    },

    /// The broadcast server shut itself down while the host was running.
    #[error("broadcast server closed unexpectedly")]
    ServerClosed,
}
