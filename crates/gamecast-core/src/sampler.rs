//! Producer side: sampling host state into the snapshot cache.
//!
//! The host calls [`Sampler::on_tick`] from its own update cycle, at
//! whatever rate it runs. Each call asks the [`SnapshotSource`] for a
//! fresh payload and stores it in the cache. A failing source never
//! stops the pipeline: the previous snapshot stays cached and keeps
//! being broadcast, and failures are logged at a bounded rate so a
//! persistent fault does not flood the log at 60 Hz.

use std::sync::Arc;

use tracing::{debug, error};

use crate::cache::SnapshotCache;
use crate::config::SamplerConfig;
use crate::snapshot::{Snapshot, SnapshotError};

/// Errors a snapshot source can report.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// The host state could not be read this tick.
    #[error("host state unavailable: {reason}")]
    Unavailable {
        /// Why the state could not be read.
        reason: String,
    },

    /// The state was read but could not be encoded.
    #[error("encode error: {source}")]
    Encode {
        /// The underlying encoding error.
        #[from]
        source: SnapshotError,
    },
}

/// Something that can serialize the current host state.
///
/// Called once per host tick, so implementations should be cheap and
/// may reuse buffers between calls.
pub trait SnapshotSource {
    /// Produce a snapshot of the current state.
    fn collect(&mut self) -> Result<Snapshot, SourceError>;
}

impl<F> SnapshotSource for F
where
    F: FnMut() -> Result<Snapshot, SourceError>,
{
    fn collect(&mut self) -> Result<Snapshot, SourceError> {
        self()
    }
}

/// Counters describing sampler activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SamplerStats {
    /// Host ticks seen.
    pub ticks: u64,
    /// Snapshots written to the cache.
    pub published: u64,
    /// Ticks on which the source failed.
    pub failures: u64,
}

/// Drives a [`SnapshotSource`] into a [`SnapshotCache`].
pub struct Sampler<S> {
    source: S,
    cache: Arc<SnapshotCache>,
    config: SamplerConfig,
    stats: SamplerStats,
    last_error_log: Option<u64>,
    suppressed: u64,
}

impl<S: SnapshotSource> Sampler<S> {
    /// Create a sampler writing into `cache`.
    pub const fn new(source: S, cache: Arc<SnapshotCache>, config: SamplerConfig) -> Self {
        Self {
            source,
            cache,
            config,
            stats: SamplerStats {
                ticks: 0,
                published: 0,
                failures: 0,
            },
            last_error_log: None,
            suppressed: 0,
        }
    }

    /// Sample once. Returns `true` if a new snapshot was published.
    pub fn on_tick(&mut self) -> bool {
        self.stats.ticks = self.stats.ticks.saturating_add(1);
        self.heartbeat();

        match self.source.collect() {
            Ok(snapshot) => {
                self.cache.set(snapshot);
                self.stats.published = self.stats.published.saturating_add(1);
                true
            }
            Err(e) => {
                self.stats.failures = self.stats.failures.saturating_add(1);
                self.report_failure(&e);
                false
            }
        }
    }

    /// Activity counters.
    pub const fn stats(&self) -> SamplerStats {
        self.stats
    }

    /// The wrapped source.
    pub const fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the wrapped source.
    pub const fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    fn heartbeat(&self) {
        let since_first = self.stats.ticks.saturating_sub(1);
        if since_first.checked_rem(self.config.heartbeat_every) == Some(0) {
            debug!(
                ticks = self.stats.ticks,
                published = self.stats.published,
                failures = self.stats.failures,
                "Sampler running"
            );
        }
    }

    fn report_failure(&mut self, e: &SourceError) {
        let due = self.last_error_log.is_none_or(|last| {
            self.stats.ticks.saturating_sub(last) >= self.config.error_log_every
        });

        if due {
            error!(
                error = %e,
                tick = self.stats.ticks,
                suppressed = self.suppressed,
                "Snapshot source failed, keeping previous snapshot"
            );
            self.last_error_log = Some(self.stats.ticks);
            self.suppressed = 0;
        } else {
            self.suppressed = self.suppressed.saturating_add(1);
        }
    }
}

impl<S> std::fmt::Debug for Sampler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("stats", &self.stats)
            .field("suppressed", &self.suppressed)
            .finish_non_exhaustive()
    }
}
