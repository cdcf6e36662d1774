//! WebSocket broadcast server for Gamecast.
//!
//! This crate provides an Axum server that:
//!
//! - accepts `WebSocket` upgrades on a single path (default `/`) and
//!   answers every other request with `400 Bad Request`
//! - registers each connected client and watches its read half for
//!   close frames or EOF
//! - runs the [`gamecast_core::Broadcaster`] at a fixed cadence, pushing
//!   the newest cached snapshot to every client as one text frame
//! - shuts itself down when its listener keeps failing, reporting the
//!   error through [`BroadcastServer::failure`]
//!
//! # Architecture
//!
//! The host writes snapshots into a shared
//! [`SnapshotCache`](gamecast_core::SnapshotCache); the server only ever
//! reads it. [`BroadcastServer`] owns the listener, the broadcast task,
//! and the cancellation token that every per-client task observes.

pub mod client;
pub mod error;
pub mod frame;
pub mod listener;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::{RequestError, ServerError};
pub use frame::FrameCache;
pub use router::build_router;
pub use server::{BroadcastServer, ServerPhase, StopOutcome};
pub use state::AppState;
