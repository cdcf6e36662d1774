//! Snapshot-and-broadcast core for Gamecast.
//!
//! The pipeline is producer → cache → broadcaster:
//!
//! - The host calls a [`Sampler`] once per update tick; it collects a
//!   [`Snapshot`] from a [`SnapshotSource`] and stores it in the
//!   [`SnapshotCache`].
//! - The [`Broadcaster`] wakes on a fixed interval, reads the cache, and
//!   pushes the newest snapshot to every client in the
//!   [`ClientRegistry`] concurrently.
//!
//! The cache and the registry are the only shared mutable state. Each has
//! its own short lock and neither lock is held across network I/O.
//!
//! # Modules
//!
//! - [`snapshot`] -- The immutable payload type.
//! - [`cache`] -- Single-slot latest-value cache.
//! - [`sink`] -- [`ClientSink`] trait implemented by client transports.
//! - [`registry`] -- Connected client registry.
//! - [`broadcast`] -- Fixed-cadence fan-out loop.
//! - [`sampler`] -- Host-driven producer side.
//! - [`config`] -- Configuration loading from `gamecast.yaml`.

pub mod broadcast;
pub mod cache;
pub mod config;
pub mod registry;
pub mod sampler;
pub mod sink;
pub mod snapshot;

pub use broadcast::{Broadcaster, TickReport};
pub use cache::SnapshotCache;
pub use registry::{ClientRegistry, SharedSink};
pub use sampler::{Sampler, SamplerStats, SnapshotSource, SourceError};
pub use sink::{ClientSink, SendError};
pub use snapshot::{Snapshot, SnapshotError};
