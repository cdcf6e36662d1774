//! Listener wrapper that turns a dead listening socket into a shutdown.
//!
//! Axum's own [`Listener`] for [`TcpListener`] retries every accept error
//! forever, so a listener that can no longer accept would leave the
//! server looking healthy while nobody can connect. [`GuardedListener`]
//! keeps axum's retry for errors that belong to a single connection, backs
//! off on anything else, and once failures persist records the error in a
//! [`ListenerFault`] and cancels the server token.

use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::serve::Listener;
use parking_lot::Mutex;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Pause after an accept error that is not tied to one connection.
pub const ACCEPT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Consecutive listener errors after which the listener is considered dead.
pub const MAX_ACCEPT_FAILURES: u32 = 5;

/// A source of inbound connections that reports accept errors.
pub trait Acceptor: Send + 'static {
    /// Connection stream type.
    type Io: AsyncRead + AsyncWrite + Unpin + Send + 'static;
    /// Peer address type.
    type Addr: Send + Debug;

    /// Accept the next connection.
    fn try_accept(&mut self) -> impl Future<Output = io::Result<(Self::Io, Self::Addr)>> + Send;

    /// The bound local address.
    fn local_addr(&self) -> io::Result<Self::Addr>;
}

impl Acceptor for TcpListener {
    type Io = TcpStream;
    type Addr = SocketAddr;

    fn try_accept(&mut self) -> impl Future<Output = io::Result<(TcpStream, SocketAddr)>> + Send {
        TcpListener::accept(self)
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        Self::local_addr(self)
    }
}

/// First fatal listener error, shared between the listener and its owner.
#[derive(Debug, Clone, Default)]
pub struct ListenerFault(Arc<Mutex<Option<String>>>);

impl ListenerFault {
    /// Create an empty fault slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `message` unless an earlier fault is already recorded.
    pub fn record(&self, message: impl Into<String>) {
        let mut slot = self.0.lock();
        if slot.is_none() {
            *slot = Some(message.into());
        }
    }

    /// The recorded fault, if any.
    pub fn get(&self) -> Option<String> {
        self.0.lock().clone()
    }
}

/// An [`Acceptor`] served by axum that cancels `shutdown` when it dies.
#[derive(Debug)]
pub struct GuardedListener<A> {
    inner: A,
    shutdown: CancellationToken,
    fault: ListenerFault,
}

impl<A: Acceptor> GuardedListener<A> {
    /// Wrap `inner`; a fatal error is stored in `fault` and cancels
    /// `shutdown`.
    pub const fn new(inner: A, shutdown: CancellationToken, fault: ListenerFault) -> Self {
        Self {
            inner,
            shutdown,
            fault,
        }
    }

    /// The fault slot this listener reports into.
    pub const fn fault(&self) -> &ListenerFault {
        &self.fault
    }
}

impl<A: Acceptor> Listener for GuardedListener<A> {
    type Io = A::Io;
    type Addr = A::Addr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        let mut failures = 0_u32;
        loop {
            match self.inner.try_accept().await {
                Ok(conn) => return conn,
                Err(e) if is_connection_error(&e) => {
                    debug!(error = %e, "Connection dropped during accept");
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if failures >= MAX_ACCEPT_FAILURES {
                        error!(error = %e, failures, "Listener failed, shutting down broadcast server");
                        self.fault.record(format!("accept failed {failures} times: {e}"));
                        self.shutdown.cancel();
                        // Axum stops polling accept once the shutdown signal fires.
                        return std::future::pending().await;
                    }
                    warn!(error = %e, failures, "Accept error, retrying");
                    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                }
            }
        }
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

/// Errors that concern one inbound connection, not the listener.
fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
