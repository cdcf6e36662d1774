//! End-to-end tests for the broadcast server over real sockets.
//!
//! Each test binds an OS-assigned loopback port and talks to it with a
//! `tokio-tungstenite` client or a raw TCP stream.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::{SinkExt as _, StreamExt as _};
use gamecast_core::config::ServerConfig;
use gamecast_core::{Snapshot, SnapshotCache};
use gamecast_server::{BroadcastServer, ServerError, ServerPhase, StopOutcome};
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(3);

async fn start_server(config: ServerConfig) -> (BroadcastServer, SocketAddr) {
    let server = BroadcastServer::new(config, Arc::new(SnapshotCache::new()));
    let addr = server.start().await.unwrap();
    (server, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _response) = connect_async(format!("ws://{addr}/")).await.unwrap();
    ws
}

async fn wait_for_clients(server: &BroadcastServer, expected: usize) {
    tokio::time::timeout(WAIT, async {
        while server.client_count() != expected {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "expected {expected} clients, have {}",
            server.client_count()
        )
    });
}

/// Read frames until a text frame arrives, returning its payload.
async fn next_text(ws: &mut Client) -> String {
    tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => return text.as_str().to_owned(),
                Some(Ok(_)) => {}
                other => panic!("stream ended before a text frame: {other:?}"),
            }
        }
    })
    .await
    .unwrap()
}

/// Read text frames until one equals `expected`.
async fn wait_for_text(ws: &mut Client, expected: &str) {
    tokio::time::timeout(WAIT, async {
        while next_text(ws).await != expected {}
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_lifecycle_phases() {
    let server = BroadcastServer::new(ServerConfig::ephemeral(), Arc::new(SnapshotCache::new()));
    assert_eq!(server.phase(), ServerPhase::NotStarted);
    assert!(server.local_addr().is_none());
    assert_eq!(server.stop().await, StopOutcome::NotRunning);
    assert_eq!(server.phase(), ServerPhase::NotStarted);

    let addr = server.start().await.unwrap();
    assert_eq!(server.phase(), ServerPhase::Running);
    assert_eq!(server.local_addr(), Some(addr));
    assert_ne!(addr.port(), 0);

    assert!(matches!(
        server.start().await,
        Err(ServerError::AlreadyStarted)
    ));

    assert_eq!(server.stop().await, StopOutcome::Clean);
    assert_eq!(server.phase(), ServerPhase::Stopped);
    assert!(server.local_addr().is_none());

    assert_eq!(server.stop().await, StopOutcome::NotRunning);
    assert!(matches!(server.start().await, Err(ServerError::Stopped)));
}

#[tokio::test]
async fn test_closed_resolves_after_stop() {
    let (server, _addr) = start_server(ServerConfig::ephemeral()).await;

    let pending = tokio::time::timeout(Duration::from_millis(50), server.closed()).await;
    assert!(pending.is_err());

    server.stop().await;
    tokio::time::timeout(WAIT, server.closed()).await.unwrap();
}

#[tokio::test]
async fn test_client_receives_cached_snapshot() {
    let (server, addr) = start_server(ServerConfig::ephemeral()).await;
    server
        .cache()
        .set(Snapshot::from(r#"{"gameState":"LOBBY"}"#));

    let mut ws = connect(addr).await;
    assert_eq!(next_text(&mut ws).await, r#"{"gameState":"LOBBY"}"#);

    server.stop().await;
}

#[tokio::test]
async fn test_nothing_sent_until_first_snapshot() {
    let (server, addr) = start_server(ServerConfig::ephemeral()).await;

    let mut ws = connect(addr).await;
    wait_for_clients(&server, 1).await;

    let early = tokio::time::timeout(Duration::from_millis(100), ws.next()).await;
    assert!(early.is_err(), "received a frame before any snapshot");

    server.cache().set(Snapshot::from("{}"));
    assert_eq!(next_text(&mut ws).await, "{}");

    server.stop().await;
}

#[tokio::test]
async fn test_unchanged_snapshot_is_resent_every_tick() {
    let (server, addr) = start_server(ServerConfig::ephemeral()).await;
    server.cache().set(Snapshot::from(r#"{"gameState":"MENU"}"#));

    let mut ws = connect(addr).await;
    for _ in 0..3 {
        assert_eq!(next_text(&mut ws).await, r#"{"gameState":"MENU"}"#);
    }

    server.stop().await;
}

#[tokio::test]
async fn test_newest_snapshot_replaces_older() {
    let (server, addr) = start_server(ServerConfig::ephemeral()).await;
    let mut ws = connect(addr).await;
    wait_for_clients(&server, 1).await;

    server.cache().set(Snapshot::from("A"));
    server.cache().set(Snapshot::from("B"));

    // "A" may never be observed; "B" must be.
    wait_for_text(&mut ws, "B").await;

    server.stop().await;
}

#[tokio::test]
async fn test_closed_client_is_deregistered() {
    let (server, addr) = start_server(ServerConfig::ephemeral()).await;

    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    wait_for_clients(&server, 2).await;

    first.close(None).await.unwrap();
    wait_for_clients(&server, 1).await;

    server.cache().set(Snapshot::from(r#"{"gameState":"TASKS"}"#));
    wait_for_text(&mut second, r#"{"gameState":"TASKS"}"#).await;
    assert_eq!(server.client_count(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_dropped_connection_is_deregistered() {
    let (server, addr) = start_server(ServerConfig::ephemeral()).await;

    let ws = connect(addr).await;
    wait_for_clients(&server, 1).await;

    drop(ws);
    wait_for_clients(&server, 0).await;

    server.stop().await;
}

#[tokio::test]
async fn test_client_messages_are_ignored() {
    let (server, addr) = start_server(ServerConfig::ephemeral()).await;
    server.cache().set(Snapshot::from("{}"));

    let mut ws = connect(addr).await;
    ws.send(Message::text("start the meeting")).await.unwrap();
    ws.send(Message::binary(vec![1_u8, 2, 3])).await.unwrap();

    assert_eq!(next_text(&mut ws).await, "{}");
    assert_eq!(server.client_count(), 1);

    server.stop().await;
}

#[tokio::test]
async fn test_plain_http_request_gets_bad_request() {
    let (server, addr) = start_server(ServerConfig::ephemeral()).await;

    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();

    let mut buf = Vec::new();
    tokio::time::timeout(WAIT, async {
        let mut chunk = [0_u8; 512];
        while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
            let read = stream.read(&mut chunk).await.unwrap();
            if read == 0 {
                break;
            }
            buf.extend_from_slice(chunk.get(..read).unwrap());
        }
    })
    .await
    .unwrap();

    let head = String::from_utf8_lossy(&buf);
    assert!(head.starts_with("HTTP/1.1 400"), "unexpected response: {head}");
    assert_eq!(server.client_count(), 0);

    server.stop().await;
}

#[tokio::test]
async fn test_stop_closes_connected_clients() {
    let (server, addr) = start_server(ServerConfig::ephemeral()).await;
    server.cache().set(Snapshot::from("{}"));

    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    wait_for_clients(&server, 2).await;

    let outcome = server.stop().await;
    assert_eq!(outcome, StopOutcome::Clean);
    assert_eq!(server.client_count(), 0);

    for ws in [&mut first, &mut second] {
        let ended = tokio::time::timeout(WAIT, async {
            loop {
                match ws.next().await {
                    Some(Ok(Message::Close(_)) | Err(_)) | None => return,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(ended.is_ok(), "client was not disconnected");
    }

    assert!(connect_async(format!("ws://{addr}/")).await.is_err());
}

#[tokio::test]
async fn test_stop_is_bounded_with_unread_clients() {
    let config = ServerConfig {
        shutdown_grace_ms: 300,
        send_timeout_ms: 100,
        ..ServerConfig::ephemeral()
    };
    let (server, addr) = start_server(config).await;
    server
        .cache()
        .set(Snapshot::from("x".repeat(262_144)));

    // Clients that never read so the server's writes back up.
    let _first = connect(addr).await;
    let _second = connect(addr).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    let outcome = server.stop().await;
    let elapsed = started.elapsed();

    assert!(matches!(outcome, StopOutcome::Clean | StopOutcome::TimedOut));
    assert!(
        elapsed < Duration::from_millis(1500),
        "stop took {elapsed:?}"
    );
    assert_eq!(server.phase(), ServerPhase::Stopped);
    assert_eq!(server.client_count(), 0);
}

#[tokio::test]
async fn test_stop_reaps_pinging_client_that_never_reads() {
    let config = ServerConfig {
        shutdown_grace_ms: 500,
        send_timeout_ms: 100,
        ..ServerConfig::ephemeral()
    };
    let (server, addr) = start_server(config).await;
    server
        .cache()
        .set(Snapshot::from("x".repeat(1_048_576)));

    // Keeps the server's read half busy with pings while its writes back up.
    let (mut sink, _unread) = connect(addr).await.split();
    let pinger = tokio::spawn(async move {
        while sink.send(Message::Ping(Vec::<u8>::new().into())).await.is_ok() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    });
    wait_for_clients(&server, 1).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let outcome = server.stop().await;
    assert!(matches!(outcome, StopOutcome::Clean | StopOutcome::TimedOut));
    assert_eq!(server.phase(), ServerPhase::Stopped);

    tokio::time::timeout(WAIT, async {
        while server.connection_tasks() != 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| {
        panic!(
            "{} connection tasks outlived stop",
            server.connection_tasks()
        )
    });

    pinger.abort();
}

#[tokio::test]
async fn test_bind_conflict_leaves_server_not_started() {
    let (first, addr) = start_server(ServerConfig::ephemeral()).await;

    let config = ServerConfig {
        port: addr.port(),
        ..ServerConfig::ephemeral()
    };
    let second = BroadcastServer::new(config, Arc::new(SnapshotCache::new()));

    assert!(matches!(second.start().await, Err(ServerError::Bind(_))));
    assert_eq!(second.phase(), ServerPhase::NotStarted);

    first.stop().await;
}

#[tokio::test]
async fn test_invalid_host_is_config_error() {
    let config = ServerConfig {
        host: String::from("not a host"),
        ..ServerConfig::ephemeral()
    };
    let server = BroadcastServer::new(config, Arc::new(SnapshotCache::new()));

    assert!(matches!(
        server.start().await,
        Err(ServerError::Config { .. })
    ));
    assert_eq!(server.phase(), ServerPhase::NotStarted);
}
