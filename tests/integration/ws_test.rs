//! Integration tests for the WebSocket connection lifecycle.

mod helpers;

use std::time::Duration;

use futures::SinkExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;

use quotahub_auth::admission::DEVICE_LIMIT_MESSAGE;

use helpers::TestApp;

#[tokio::test]
async fn test_second_device_is_refused_and_first_unaffected() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Ada Lovelace", None);
    let token = app.token_for(id);

    let mut a = helpers::connect_ok(addr, &token, "phone").await;
    assert_eq!(helpers::next_json(&mut a).await["type"], "init_state");

    let mut b = helpers::connect_ok(addr, &token, "laptop").await;
    let refusal = helpers::next_json(&mut b).await;
    assert_eq!(refusal["type"], "error");
    assert_eq!(refusal["message"], DEVICE_LIMIT_MESSAGE);
    assert_eq!(helpers::expect_close(&mut b).await, Some(4009));

    let sessions = app.engine.registry.list_sessions(id).await.expect("list");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].device_id, "phone");

    helpers::assert_silent(&mut a, Duration::from_millis(100)).await;
    helpers::send_task_complete(&mut a).await;
    assert_eq!(helpers::next_json(&mut a).await["dailyUsage"], 1);
}

#[tokio::test]
async fn test_credentials_from_headers() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Ada Lovelace", None);
    let token = app.token_for(id);

    let mut request = format!("ws://{addr}/ws")
        .into_client_request()
        .expect("request");
    let headers = request.headers_mut();
    headers.insert("authorization", format!("Bearer {token}").parse().expect("header"));
    headers.insert("x-device-id", "tablet".parse().expect("header"));
    headers.insert("user-agent", "QuotaHubTest/1.0".parse().expect("header"));

    let (mut ws, _) = connect_async(request).await.expect("upgrade");
    assert_eq!(helpers::next_json(&mut ws).await["type"], "init_state");

    let sessions = app.engine.registry.list_sessions(id).await.expect("list");
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].device_id, "tablet");
    assert_eq!(
        sessions[0].device_info,
        Some(serde_json::json!({ "userAgent": "QuotaHubTest/1.0" }))
    );
}

#[tokio::test]
async fn test_invalid_message_gets_error_frame() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Ada Lovelace", None);
    let token = app.token_for(id);

    let mut ws = helpers::connect_ok(addr, &token, "A").await;
    helpers::next_json(&mut ws).await;

    ws.send(Message::text("not json")).await.expect("send");
    assert_eq!(helpers::next_json(&mut ws).await["type"], "error");

    ws.send(Message::text(r#"{"type":"unknown_event"}"#))
        .await
        .expect("send");
    assert_eq!(helpers::next_json(&mut ws).await["type"], "error");

    // The connection survives and usage is untouched.
    ws.send(Message::text(r#"{"type":"task_complete","data":{"taskId":7}}"#))
        .await
        .expect("send");
    assert_eq!(helpers::next_json(&mut ws).await["dailyUsage"], 1);
}

#[tokio::test]
async fn test_shutdown_closes_connections_and_clears_rows() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Ada Lovelace", None);
    let token = app.token_for(id);

    let mut ws = helpers::connect_ok(addr, &token, "A").await;
    helpers::next_json(&mut ws).await;
    assert_eq!(app.sessions.len(), 1);

    app.engine.shutdown().await.expect("shutdown");

    assert_eq!(helpers::expect_close(&mut ws).await, Some(1001));
    assert!(app.sessions.is_empty());
    assert_eq!(app.engine.connections.connection_count(), 0);
}
