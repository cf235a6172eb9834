//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;

use quotahub_auth::jwt::JwtEncoder;
use quotahub_core::config::{AppConfig, StorageBackend};
use quotahub_core::types::SubscriberId;
use quotahub_database::{MemorySessionStore, MemorySubscriberStore};
use quotahub_entity::plan::Plan;
use quotahub_entity::subscriber::Subscriber;
use quotahub_realtime::RealtimeEngine;

/// A client-side WebSocket.
pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for a frame before failing.
const FRAME_TIMEOUT: Duration = Duration::from_secs(5);

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// The engine behind the router
    pub engine: Arc<RealtimeEngine>,
    /// Subscriber and plan rows
    pub subscribers: MemorySubscriberStore,
    /// Session rows
    pub sessions: MemorySessionStore,
    /// Application config
    pub config: AppConfig,
    encoder: JwtEncoder,
}

impl TestApp {
    /// Create a new test application over in-memory stores
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        config.auth.jwt_secret = "integration-test-secret".to_string();

        let subscribers = MemorySubscriberStore::new();
        let sessions = MemorySessionStore::new();
        let engine = Arc::new(RealtimeEngine::new(
            &config,
            Arc::new(subscribers.clone()),
            Arc::new(sessions.clone()),
        ));

        let state = quotahub_api::AppState::new(Arc::new(config.clone()), Arc::clone(&engine));
        let router = quotahub_api::build_router(state);

        Self {
            router,
            engine,
            subscribers,
            sessions,
            encoder: JwtEncoder::new(&config.auth),
            config,
        }
    }

    /// Insert a subscriber, optionally on a plan, and return its id
    pub fn subscriber(&self, name: &str, plan: Option<Plan>) -> SubscriberId {
        let plan_id = plan.map(|p| self.subscribers.insert_plan(p));
        let email = format!("{}@example.com", name.to_lowercase().replace(' ', "."));
        self.subscribers
            .insert_subscriber(Subscriber::new(name, email, plan_id))
    }

    /// Issue a valid token for a subscriber
    pub fn token_for(&self, id: SubscriberId) -> String {
        self.encoder.issue(id, None).expect("Failed to issue token")
    }

    /// Send a request through the router without a network listener
    pub async fn request(&self, method: &str, path: &str) -> TestResponse {
        let req = Request::builder()
            .method(method)
            .uri(path)
            .body(Body::empty())
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");
        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }

    /// Serve the router on an ephemeral local port
    pub async fn spawn(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("Test server failed");
        });
        addr
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}

/// Open a WebSocket with the given handshake parameters.
///
/// Returns the HTTP status if the upgrade is refused.
pub async fn connect(
    addr: SocketAddr,
    token: Option<&str>,
    device_id: Option<&str>,
) -> Result<WsClient, u16> {
    let mut params = Vec::new();
    if let Some(token) = token {
        params.push(format!("token={token}"));
    }
    if let Some(device_id) = device_id {
        params.push(format!("deviceId={device_id}"));
    }
    let url = format!("ws://{addr}/ws?{}", params.join("&"));

    match connect_async(url.as_str()).await {
        Ok((ws, _)) => Ok(ws),
        Err(tokio_tungstenite::tungstenite::Error::Http(response)) => {
            Err(response.status().as_u16())
        }
        Err(e) => panic!("Unexpected handshake error: {e}"),
    }
}

/// Open a WebSocket that is expected to be upgraded
pub async fn connect_ok(addr: SocketAddr, token: &str, device_id: &str) -> WsClient {
    connect(addr, Some(token), Some(device_id))
        .await
        .unwrap_or_else(|status| panic!("Upgrade refused with HTTP {status}"))
}

/// Read the next JSON text frame, skipping control frames
pub async fn next_json(ws: &mut WsClient) -> Value {
    loop {
        let msg = tokio::time::timeout(FRAME_TIMEOUT, ws.next())
            .await
            .expect("Timed out waiting for a frame")
            .expect("Stream ended")
            .expect("WebSocket error");
        match msg {
            Message::Text(text) => {
                return serde_json::from_str(text.as_str()).expect("Frame is not JSON");
            }
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected a text frame, got {other:?}"),
        }
    }
}

/// Read frames until the server closes, returning the close code
pub async fn expect_close(ws: &mut WsClient) -> Option<u16> {
    loop {
        let next = tokio::time::timeout(FRAME_TIMEOUT, ws.next())
            .await
            .expect("Timed out waiting for close");
        match next {
            Some(Ok(Message::Close(frame))) => return frame.map(|f| u16::from(f.code)),
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => return None,
        }
    }
}

/// Send a usage-completion signal
pub async fn send_task_complete(ws: &mut WsClient) {
    ws.send(Message::text(r#"{"type":"task_complete"}"#))
        .await
        .expect("Failed to send task_complete");
}

/// Assert that no text frame arrives within `wait`
pub async fn assert_silent(ws: &mut WsClient, wait: Duration) {
    if let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(wait, ws.next()).await {
        panic!("Unexpected frame: {}", text.as_str());
    }
}

/// Wait until `check` holds, polling briefly
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("Condition not met in time");
}
