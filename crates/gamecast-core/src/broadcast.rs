//! Fixed-cadence broadcast loop.
//!
//! Every tick the [`Broadcaster`] reads the newest snapshot from the
//! [`SnapshotCache`], takes a point-in-time copy of the
//! [`ClientRegistry`], and sends the snapshot to every client
//! concurrently. Each send has its own deadline; a client whose send
//! fails or times out is evicted without affecting the others. Evicted
//! clients are closed on the broadcaster's [`TaskTracker`], so an owner
//! sharing that tracker waits for those closes on shutdown.
//!
//! Unchanged snapshots are re-sent every tick so viewers see a constant
//! cadence regardless of how often the host produces samples.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use gamecast_types::ClientId;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace};

use crate::cache::SnapshotCache;
use crate::registry::{ClientRegistry, SharedSink};
use crate::sink::SendError;
use crate::snapshot::Snapshot;

/// Default time between broadcast ticks (~60 Hz).
pub const DEFAULT_BROADCAST_INTERVAL: Duration = Duration::from_millis(16);

/// Default deadline for a single client send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_millis(250);

/// What a single broadcast tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickReport {
    /// The cache was empty; nothing was sent.
    NoData,
    /// No clients were registered; nothing was sent.
    NoClients,
    /// The snapshot was dispatched to every registered client.
    Sent {
        /// Clients whose send completed.
        delivered: usize,
        /// Clients removed because their send failed or timed out.
        evicted: usize,
    },
}

/// Pushes the cached snapshot to every registered client.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    cache: Arc<SnapshotCache>,
    registry: Arc<ClientRegistry>,
    send_timeout: Duration,
    tracker: TaskTracker,
}

impl Broadcaster {
    /// Create a broadcaster over a shared cache and registry.
    pub fn new(
        cache: Arc<SnapshotCache>,
        registry: Arc<ClientRegistry>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            cache,
            registry,
            send_timeout,
            tracker: TaskTracker::new(),
        }
    }

    /// Run eviction closes on `tracker` instead of a private one.
    #[must_use]
    pub fn with_tracker(mut self, tracker: TaskTracker) -> Self {
        self.tracker = tracker;
        self
    }

    /// Tracker that owns in-flight eviction closes.
    pub const fn tracker(&self) -> &TaskTracker {
        &self.tracker
    }

    /// Run one broadcast tick.
    pub async fn tick(&self) -> TickReport {
        let Some(snapshot) = self.cache.get() else {
            return TickReport::NoData;
        };

        let clients = self.registry.snapshot();
        if clients.is_empty() {
            return TickReport::NoClients;
        }

        let sends = clients.iter().map(|(id, sink)| {
            let snapshot = &snapshot;
            async move { (*id, self.send_one(sink, snapshot).await) }
        });
        let results = join_all(sends).await;

        let mut delivered: usize = 0;
        let mut evicted: usize = 0;
        for (id, result) in results {
            match result {
                Ok(()) => delivered = delivered.saturating_add(1),
                Err(error) => {
                    if self.evict(id, &error) {
                        evicted = evicted.saturating_add(1);
                    }
                }
            }
        }

        TickReport::Sent { delivered, evicted }
    }

    /// Tick at `interval` until `shutdown` is cancelled.
    ///
    /// Cancellation is observed both between ticks and while a tick's
    /// sends are in flight; in the latter case the pending sends are
    /// dropped.
    pub async fn run(self, interval: Duration, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            send_timeout_ms = timeout_ms(self.send_timeout),
            "Broadcast loop started"
        );

        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    debug!("Shutdown during broadcast tick, abandoning in-flight sends");
                    break;
                }
                report = self.tick() => {
                    if let TickReport::Sent { evicted, .. } = report {
                        if evicted > 0 {
                            debug!(evicted, "Evicted clients during broadcast tick");
                        }
                    }
                    trace!(?report, "Broadcast tick complete");
                }
            }
        }

        info!("Broadcast loop stopped");
    }

    async fn send_one(&self, sink: &SharedSink, snapshot: &Snapshot) -> Result<(), SendError> {
        match tokio::time::timeout(self.send_timeout, sink.send(snapshot)).await {
            Ok(result) => result,
            Err(_elapsed) => Err(SendError::TimedOut {
                after_ms: timeout_ms(self.send_timeout),
            }),
        }
    }

    /// Remove a failed client and close it on the tracker.
    ///
    /// Returns `false` if another path already removed it.
    fn evict(&self, id: ClientId, error: &SendError) -> bool {
        let Some(sink) = self.registry.remove(id) else {
            return false;
        };
        debug!(client = %id, %error, "Client send failed, evicting");

        let close_timeout = self.send_timeout;
        self.tracker.spawn(async move {
            if tokio::time::timeout(close_timeout, sink.close()).await.is_err() {
                debug!(client = %id, "Close of evicted client timed out");
            }
        });
        true
    }
}

fn timeout_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
