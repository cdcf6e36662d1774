//! Shared type definitions for Gamecast.
//!
//! This crate holds the types that cross crate boundaries: the identifier
//! used to key connected viewers and the game-state tree that the host
//! serializes into every snapshot.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrapper for client identifiers
//! - [`game_state`] -- The camelCase game-state snapshot tree

pub mod game_state;
pub mod ids;

// Re-export all public types at crate root for convenience.
pub use game_state::{
    GameData, GamePhase, GameState, NO_MEETING_HUD, PlayerData, Position, SelfInfo,
};
pub use ids::ClientId;
