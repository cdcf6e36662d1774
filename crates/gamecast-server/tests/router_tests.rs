//! Integration tests for request routing.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. A request that never went through hyper's
//! upgrade machinery cannot become a `WebSocket`, which is exactly the
//! plain-HTTP case these tests cover.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use gamecast_core::SnapshotCache;
use gamecast_server::router::build_router;
use gamecast_server::state::AppState;
use serde_json::Value;
use tower::ServiceExt;

fn make_state(ws_path: &str) -> Arc<AppState> {
    Arc::new(AppState::new(Arc::new(SnapshotCache::new()), ws_path))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_plain_get_on_ws_path_is_bad_request() {
    let app = build_router(make_state("/"));

    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers().get(header::CONNECTION).unwrap(),
        "close"
    );
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 400);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("expected a WebSocket upgrade"));
}

#[tokio::test]
async fn test_post_on_ws_path_is_bad_request() {
    let app = build_router(make_state("/"));

    let response = app
        .oneshot(Request::post("/").body(Body::from("hello")).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upgrade_headers_without_connection_is_bad_request() {
    let app = build_router(make_state("/"));

    let request = Request::get("/")
        .header(header::CONNECTION, "upgrade")
        .header(header::UPGRADE, "websocket")
        .header(header::SEC_WEBSOCKET_VERSION, "13")
        .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unknown_path_is_bad_request() {
    let app = build_router(make_state("/"));

    let response = app
        .oneshot(Request::get("/api/world").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "no WebSocket endpoint at /api/world");
}

#[tokio::test]
async fn test_custom_ws_path_moves_the_endpoint() {
    let app = build_router(make_state("/live"));

    let response = app
        .clone()
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["error"], "no WebSocket endpoint at /");

    let response = app
        .oneshot(Request::get("/live").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"]
        .as_str()
        .unwrap()
        .starts_with("expected a WebSocket upgrade"));
}
