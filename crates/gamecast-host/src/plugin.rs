//! Host-facing control points.
//!
//! A host embeds Gamecast through three calls: [`GamecastPlugin::load`]
//! when it starts, [`GamecastPlugin::on_fixed_update`] from every player
//! object's fixed update, and [`GamecastPlugin::unload`] on the way out.
//! Only the local player's update samples, so the snapshot is refreshed
//! once per host tick regardless of roster size.

use std::sync::Arc;

use gamecast_core::config::GamecastConfig;
use gamecast_core::{Sampler, SamplerStats, SnapshotCache, SnapshotSource};
use gamecast_server::{BroadcastServer, StopOutcome};
use tracing::info;

use crate::error::HostError;

/// The broadcast server plus the sampler feeding it.
#[derive(Debug)]
pub struct GamecastPlugin<S> {
    sampler: Sampler<S>,
    server: BroadcastServer,
}

impl<S: SnapshotSource> GamecastPlugin<S> {
    /// Create the cache and server, start listening, and wire `source`
    /// into a sampler.
    pub async fn load(config: &GamecastConfig, source: S) -> Result<Self, HostError> {
        let cache = Arc::new(SnapshotCache::new());
        let server = BroadcastServer::new(config.server.clone(), Arc::clone(&cache));
        let addr = server.start().await?;

        info!(addr = %addr, "Gamecast plugin loaded");
        Ok(Self {
            sampler: Sampler::new(source, cache, config.sampler),
            server,
        })
    }

    /// Fixed-update hook, called once per player object per host tick.
    ///
    /// Returns `true` if a snapshot was published.
    pub fn on_fixed_update(&mut self, is_local_player: bool) -> bool {
        if !is_local_player {
            return false;
        }
        self.sampler.on_tick()
    }

    /// The sampled source.
    pub const fn source(&self) -> &S {
        self.sampler.source()
    }

    /// Mutable access to the sampled source.
    pub const fn source_mut(&mut self) -> &mut S {
        self.sampler.source_mut()
    }

    /// Sampler counters.
    pub const fn stats(&self) -> SamplerStats {
        self.sampler.stats()
    }

    /// The running broadcast server.
    pub const fn server(&self) -> &BroadcastServer {
        &self.server
    }

    /// Stop the server, bounded by its shutdown grace period.
    pub async fn unload(self) -> StopOutcome {
        let outcome = self.server.stop().await;
        let stats = self.sampler.stats();
        info!(
            ?outcome,
            ticks = stats.ticks,
            published = stats.published,
            failures = stats.failures,
            "Gamecast plugin unloaded"
        );
        outcome
    }
}
