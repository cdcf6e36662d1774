//! Broadcast server lifecycle management.
//!
//! [`BroadcastServer`] moves through `NotStarted → Running → Stopping →
//! Stopped`. [`start`](BroadcastServer::start) binds the listener and
//! spawns the accept loop and the broadcast loop, returning as soon as
//! the address is bound. [`stop`](BroadcastServer::stop) cancels every
//! loop, waits a bounded grace period for them, abandons whatever is
//! left, and only then closes the remaining client sockets.
//!
//! A listener that keeps failing cancels the server on its own; the
//! error is then available from [`failure`](BroadcastServer::failure).

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use futures::future::join_all;
use gamecast_core::config::ServerConfig;
use gamecast_core::{Broadcaster, SnapshotCache};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ServerError;
use crate::listener::{Acceptor, GuardedListener, ListenerFault};
use crate::router::build_router;
use crate::state::AppState;

/// Externally visible lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerPhase {
    /// Constructed, not yet bound.
    NotStarted,
    /// Listening and broadcasting.
    Running,
    /// `stop` is in progress.
    Stopping,
    /// Fully stopped; cannot be restarted.
    Stopped,
}

/// How a call to [`BroadcastServer::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The server was not running; nothing was done.
    NotRunning,
    /// All tasks exited within the grace period.
    Clean,
    /// The grace period elapsed and remaining tasks were abandoned.
    TimedOut,
}

struct RunningTasks {
    addr: SocketAddr,
    accept: JoinHandle<()>,
    broadcast: JoinHandle<()>,
}

enum Lifecycle {
    NotStarted,
    Running(RunningTasks),
    Stopping,
    Stopped,
}

/// A WebSocket server that pushes the cached snapshot to every client.
pub struct BroadcastServer {
    config: ServerConfig,
    state: Arc<AppState>,
    lifecycle: Mutex<Lifecycle>,
    fault: ListenerFault,
}

impl BroadcastServer {
    /// Create a server that will broadcast from `cache`.
    pub fn new(config: ServerConfig, cache: Arc<SnapshotCache>) -> Self {
        let state = Arc::new(AppState::new(cache, config.ws_path.clone()));
        Self {
            config,
            state,
            lifecycle: Mutex::new(Lifecycle::NotStarted),
            fault: ListenerFault::new(),
        }
    }

    /// The snapshot cache this server broadcasts from.
    pub fn cache(&self) -> &Arc<SnapshotCache> {
        &self.state.cache
    }

    /// Current lifecycle phase.
    pub fn phase(&self) -> ServerPhase {
        match &*self.lifecycle.lock() {
            Lifecycle::NotStarted => ServerPhase::NotStarted,
            Lifecycle::Running(_) => ServerPhase::Running,
            Lifecycle::Stopping => ServerPhase::Stopping,
            Lifecycle::Stopped => ServerPhase::Stopped,
        }
    }

    /// The bound address while running.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        match &*self.lifecycle.lock() {
            Lifecycle::Running(tasks) => Some(tasks.addr),
            _ => None,
        }
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.state.client_count()
    }

    /// Per-client tasks still running: connection monitors and eviction
    /// closes.
    pub fn connection_tasks(&self) -> usize {
        self.state.tracker.len()
    }

    /// Resolves once the server has been cancelled, either by
    /// [`stop`](Self::stop) or by a fatal listener error.
    pub async fn closed(&self) {
        self.state.shutdown.cancelled().await;
    }

    /// The listener error that shut the server down, if one did.
    pub fn failure(&self) -> Option<ServerError> {
        self.fault.get().map(ServerError::Serve)
    }

    /// Bind the listener and launch the accept and broadcast loops.
    ///
    /// Returns once the address is bound. A bind failure leaves the server
    /// in [`ServerPhase::NotStarted`] so the caller may retry.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        self.ensure_startable()?;

        let addr = self.config.socket_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(format!("no local address for {addr}: {e}")))?;

        self.launch(listener, local_addr)?;

        info!(
            addr = %local_addr,
            path = %self.config.ws_path,
            "Broadcast server listening"
        );
        Ok(local_addr)
    }

    /// Spawn the accept loop over `acceptor` and the broadcast loop.
    fn launch<A: Acceptor>(&self, acceptor: A, addr: SocketAddr) -> Result<(), ServerError> {
        let mut lifecycle = self.lifecycle.lock();
        // Another start may have won the race while we were binding.
        match &*lifecycle {
            Lifecycle::NotStarted => {}
            Lifecycle::Stopped => return Err(ServerError::Stopped),
            Lifecycle::Running(_) | Lifecycle::Stopping => return Err(ServerError::AlreadyStarted),
        }

        let shutdown = self.state.shutdown.clone();
        let listener = GuardedListener::new(acceptor, shutdown.clone(), self.fault.clone());
        let router = build_router(Arc::clone(&self.state));
        let accept = tokio::spawn(accept_loop(listener, router, shutdown.clone()));

        let broadcaster = Broadcaster::new(
            Arc::clone(&self.state.cache),
            Arc::clone(&self.state.registry),
            self.config.send_timeout(),
        )
        .with_tracker(self.state.tracker.clone());
        let broadcast = tokio::spawn(broadcaster.run(self.config.broadcast_interval(), shutdown));

        *lifecycle = Lifecycle::Running(RunningTasks {
            addr,
            accept,
            broadcast,
        });
        Ok(())
    }

    /// Stop the server.
    ///
    /// Cancels the accept loop, the broadcast loop and every client
    /// monitor, waits up to the configured grace period for them, then
    /// closes any client still registered. Calling this on a server that
    /// is not running returns [`StopOutcome::NotRunning`].
    pub async fn stop(&self) -> StopOutcome {
        let tasks = {
            let mut lifecycle = self.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopping) {
                Lifecycle::Running(tasks) => tasks,
                other => {
                    *lifecycle = other;
                    debug!("Stop requested on a server that is not running");
                    return StopOutcome::NotRunning;
                }
            }
        };

        info!(clients = self.client_count(), "Stopping broadcast server");
        self.state.shutdown.cancel();
        self.state.tracker.close();

        let RunningTasks {
            mut accept,
            mut broadcast,
            ..
        } = tasks;
        let grace = self.config.shutdown_grace();

        let drained = tokio::time::timeout(grace, async {
            if let Err(e) = (&mut accept).await {
                warn!(error = %e, "Accept task ended abnormally");
            }
            if let Err(e) = (&mut broadcast).await {
                warn!(error = %e, "Broadcast task ended abnormally");
            }
            self.state.tracker.wait().await;
        })
        .await;

        let outcome = if drained.is_ok() {
            StopOutcome::Clean
        } else {
            warn!(
                grace_ms = self.config.shutdown_grace_ms,
                "Shutdown grace period elapsed, abandoning remaining tasks"
            );
            accept.abort();
            broadcast.abort();
            StopOutcome::TimedOut
        };

        // Tasks have exited or been abandoned; now release the sockets.
        let leftovers = self.state.registry.drain();
        if !leftovers.is_empty() {
            let close_timeout = self.config.send_timeout();
            join_all(leftovers.into_iter().map(|(id, sink)| async move {
                if tokio::time::timeout(close_timeout, sink.close()).await.is_err() {
                    debug!(client = %id, "Close during shutdown timed out");
                }
            }))
            .await;
        }

        *self.lifecycle.lock() = Lifecycle::Stopped;
        info!(?outcome, "Broadcast server stopped");
        outcome
    }

    fn ensure_startable(&self) -> Result<(), ServerError> {
        match &*self.lifecycle.lock() {
            Lifecycle::NotStarted => Ok(()),
            Lifecycle::Stopped => Err(ServerError::Stopped),
            Lifecycle::Running(_) | Lifecycle::Stopping => Err(ServerError::AlreadyStarted),
        }
    }
}

impl Drop for BroadcastServer {
    fn drop(&mut self) {
        if matches!(*self.lifecycle.get_mut(), Lifecycle::Running(_)) {
            self.state.shutdown.cancel();
        }
    }
}

impl std::fmt::Debug for BroadcastServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BroadcastServer")
            .field("config", &self.config)
            .field("phase", &self.phase())
            .field("clients", &self.client_count())
            .finish()
    }
}

/// Serve HTTP and `WebSocket` upgrades until `shutdown` is cancelled.
///
/// The listener cancels `shutdown` itself when it dies, which ends the
/// serve future and the broadcast loop with it.
async fn accept_loop<A: Acceptor>(
    listener: GuardedListener<A>,
    router: Router,
    shutdown: CancellationToken,
) {
    let fault = listener.fault().clone();
    let result = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await;

    if let Err(e) = result {
        error!(error = %e, "Serve failed, shutting down broadcast server");
        fault.record(e.to_string());
        shutdown.cancel();
    }
    match fault.get() {
        Some(reason) => warn!(%reason, "Accept loop stopped after listener failure"),
        None => debug!("Accept loop stopped"),
    }
}
