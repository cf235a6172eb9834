//! Integration tests for handshake authentication and device admission.

mod helpers;

use std::time::Duration;

use axum::http::StatusCode;

use quotahub_auth::admission::DEVICE_LIMIT_MESSAGE;
use quotahub_database::store::SessionStore;
use quotahub_entity::plan::Plan;

use helpers::TestApp;

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let response = app.request("GET", "/api/health").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["success"], true);
    assert_eq!(response.body["data"]["status"], "ok");
}

#[tokio::test]
async fn test_detailed_health_check() {
    let app = TestApp::new();

    let response = app.request("GET", "/api/health/detailed").await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["data"]["status"], "ok");
    assert_eq!(response.body["data"]["subscriber_store"], "connected");
    assert_eq!(response.body["data"]["session_store"], "connected");
    assert_eq!(response.body["data"]["ws_connections"], 0);
}

#[tokio::test]
async fn test_unknown_route_returns_json_not_found() {
    let app = TestApp::new();

    let response = app.request("GET", "/api/plans").await;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body["error"], "NOT_FOUND");
}

#[tokio::test]
async fn test_upgrade_without_token_is_unauthorized() {
    let app = TestApp::new();
    let addr = app.spawn().await;

    let status = helpers::connect(addr, None, Some("laptop")).await.err();

    assert_eq!(status, Some(401));
    assert!(app.sessions.is_empty());
}

#[tokio::test]
async fn test_upgrade_with_invalid_token_is_unauthorized() {
    let app = TestApp::new();
    let addr = app.spawn().await;

    let status = helpers::connect(addr, Some("not-a-jwt"), Some("laptop"))
        .await
        .err();

    assert_eq!(status, Some(401));
}

#[tokio::test]
async fn test_upgrade_without_device_id_is_bad_request() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Ada Lovelace", None);
    let token = app.token_for(id);

    let status = helpers::connect(addr, Some(&token), None).await.err();

    assert_eq!(status, Some(400));
    assert!(app.sessions.is_empty());
}

#[tokio::test]
async fn test_upgrade_for_unknown_subscriber_is_unauthorized() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let token = app.token_for(quotahub_core::types::SubscriberId::new());

    let status = helpers::connect(addr, Some(&token), Some("laptop"))
        .await
        .err();

    assert_eq!(status, Some(401));
}

#[tokio::test]
async fn test_second_device_rejected_on_free_tier() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Ada Lovelace", None);
    let token = app.token_for(id);

    let mut device_a = helpers::connect_ok(addr, &token, "A").await;
    let init = helpers::next_json(&mut device_a).await;
    assert_eq!(init["type"], "init_state");

    let mut device_b = helpers::connect_ok(addr, &token, "B").await;
    let refusal = helpers::next_json(&mut device_b).await;
    assert_eq!(refusal["type"], "error");
    assert_eq!(refusal["message"], DEVICE_LIMIT_MESSAGE);
    assert_eq!(helpers::expect_close(&mut device_b).await, Some(4009));

    // Device A keeps its row and its connection.
    assert_eq!(app.sessions.len(), 1);
    assert_eq!(app.engine.connections.connection_count(), 1);
    helpers::send_task_complete(&mut device_a).await;
    let update = helpers::next_json(&mut device_a).await;
    assert_eq!(update["type"], "update_usage");
    assert_eq!(update["dailyUsage"], 1);
}

#[tokio::test]
async fn test_reconnect_same_device_at_limit_is_admitted() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Ada Lovelace", None);
    let token = app.token_for(id);

    let mut first = helpers::connect_ok(addr, &token, "A").await;
    helpers::next_json(&mut first).await;

    let mut second = helpers::connect_ok(addr, &token, "A").await;
    let init = helpers::next_json(&mut second).await;
    assert_eq!(init["type"], "init_state");
    assert_eq!(app.sessions.len(), 1);

    // The superseded connection leaving must not remove the new binding.
    first.close(None).await.expect("close");
    let engine = app.engine.clone();
    helpers::eventually(|| engine.connections.connection_count() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(app.sessions.len(), 1);
}

#[tokio::test]
async fn test_plan_allows_up_to_max_devices() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Grace Hopper", Some(Plan::new("Duo", 2, 50)));
    let token = app.token_for(id);

    let mut a = helpers::connect_ok(addr, &token, "A").await;
    let mut b = helpers::connect_ok(addr, &token, "B").await;
    assert_eq!(helpers::next_json(&mut a).await["planName"], "Duo");
    assert_eq!(helpers::next_json(&mut b).await["type"], "init_state");

    let mut c = helpers::connect_ok(addr, &token, "C").await;
    assert_eq!(helpers::next_json(&mut c).await["type"], "error");
    assert_eq!(helpers::expect_close(&mut c).await, Some(4009));
    assert_eq!(app.sessions.len(), 2);
}

#[tokio::test]
async fn test_disconnect_frees_device_slot() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Ada Lovelace", None);
    let token = app.token_for(id);

    let mut a = helpers::connect_ok(addr, &token, "A").await;
    helpers::next_json(&mut a).await;
    a.close(None).await.expect("close");

    let sessions = app.sessions.clone();
    helpers::eventually(|| sessions.is_empty()).await;

    let mut b = helpers::connect_ok(addr, &token, "B").await;
    assert_eq!(helpers::next_json(&mut b).await["type"], "init_state");
}

#[tokio::test]
async fn test_disconnect_keeps_sibling_row() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Grace Hopper", Some(Plan::new("Duo", 2, 50)));
    let token = app.token_for(id);

    let mut a = helpers::connect_ok(addr, &token, "A").await;
    let mut b = helpers::connect_ok(addr, &token, "B").await;
    helpers::next_json(&mut a).await;
    helpers::next_json(&mut b).await;

    let rows = app.sessions.list_by_subscriber(id).await.unwrap();
    let b_conn = rows
        .iter()
        .find(|row| row.device_id == "B")
        .map(|row| row.connection_id)
        .expect("B has a row");

    a.close(None).await.expect("close");
    let sessions = app.sessions.clone();
    helpers::eventually(|| sessions.len() == 1).await;

    let rows = app.sessions.list_by_subscriber(id).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].device_id, "B");
    assert_eq!(rows[0].connection_id, b_conn);

    // B is still served.
    helpers::send_task_complete(&mut b).await;
    assert_eq!(helpers::next_json(&mut b).await["dailyUsage"], 1);
}
