//! Integration tests for daily quota accounting and usage fan-out.

mod helpers;

use std::time::Duration;

use chrono::{Days, Utc};

use quotahub_entity::plan::Plan;
use quotahub_entity::subscriber::Subscriber;
use quotahub_service::quota::LIMIT_REACHED_MESSAGE;

use helpers::TestApp;

#[tokio::test]
async fn test_stale_counter_resets_and_counts_to_limit() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let today = Utc::now().date_naive();
    let yesterday = today.checked_sub_days(Days::new(1)).expect("yesterday");

    let plan_id = app.subscribers.insert_plan(Plan::new("Duo", 2, 5));
    let mut sub = Subscriber::new("Ada Lovelace", "ada@example.com", Some(plan_id));
    sub.daily_usage = 4;
    sub.last_usage_date = Some(yesterday);
    let id = app.subscribers.insert_subscriber(sub);
    let token = app.token_for(id);

    let mut ws = helpers::connect_ok(addr, &token, "A").await;
    let init = helpers::next_json(&mut ws).await;
    assert_eq!(init["type"], "init_state");
    assert_eq!(init["dailyUsage"], 0);
    assert_eq!(init["dailyLimit"], 5);
    assert_eq!(init["planName"], "Duo");
    assert_eq!(init["firstName"], "Ada");

    let persisted = app.subscribers.get(id).expect("subscriber");
    assert_eq!(persisted.daily_usage, 0);
    assert_eq!(persisted.last_usage_date, Some(today));

    for expected in 1..=5 {
        helpers::send_task_complete(&mut ws).await;
        let update = helpers::next_json(&mut ws).await;
        assert_eq!(update["type"], "update_usage");
        assert_eq!(update["dailyUsage"], expected);
        assert_eq!(update["dailyLimit"], 5);
    }
    let reached = helpers::next_json(&mut ws).await;
    assert_eq!(reached["type"], "limit_reached");
    assert_eq!(reached["message"], LIMIT_REACHED_MESSAGE);

    helpers::send_task_complete(&mut ws).await;
    let refused = helpers::next_json(&mut ws).await;
    assert_eq!(refused["type"], "limit_reached");
    assert_eq!(app.subscribers.get(id).expect("subscriber").daily_usage, 5);
}

#[tokio::test]
async fn test_exhausted_quota_announced_on_connect() {
    let app = TestApp::new();
    let addr = app.spawn().await;

    let mut sub = Subscriber::new("Grace Hopper", "grace@example.com", None);
    sub.daily_usage = 5;
    sub.last_usage_date = Some(Utc::now().date_naive());
    let id = app.subscribers.insert_subscriber(sub);
    let token = app.token_for(id);

    let mut ws = helpers::connect_ok(addr, &token, "A").await;
    assert_eq!(helpers::next_json(&mut ws).await["type"], "limit_reached");
    let init = helpers::next_json(&mut ws).await;
    assert_eq!(init["type"], "init_state");
    assert_eq!(init["dailyUsage"], 5);
    assert_eq!(init["dailyLimit"], 5);
    assert_eq!(init["planName"], "Free Tier");
}

#[tokio::test]
async fn test_usage_fans_out_to_sibling_devices_only() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Ada Lovelace", Some(Plan::new("Trio", 3, 10)));
    let other = app.subscriber("Grace Hopper", None);
    let token = app.token_for(id);
    let other_token = app.token_for(other);

    let mut origin = helpers::connect_ok(addr, &token, "A").await;
    let mut sibling = helpers::connect_ok(addr, &token, "B").await;
    let mut stranger = helpers::connect_ok(addr, &other_token, "A").await;
    for ws in [&mut origin, &mut sibling, &mut stranger] {
        assert_eq!(helpers::next_json(ws).await["type"], "init_state");
    }

    helpers::send_task_complete(&mut origin).await;

    let own = helpers::next_json(&mut origin).await;
    assert_eq!(own["type"], "update_usage");
    assert_eq!(own["dailyUsage"], 1);

    let pushed = helpers::next_json(&mut sibling).await;
    assert_eq!(pushed["type"], "update_usage");
    assert_eq!(pushed["dailyUsage"], 1);
    assert_eq!(pushed["dailyLimit"], 10);

    // The origin gets exactly one update and other subscribers get none.
    helpers::assert_silent(&mut origin, Duration::from_millis(150)).await;
    helpers::assert_silent(&mut stranger, Duration::from_millis(150)).await;
}

#[tokio::test]
async fn test_concurrent_signals_across_devices_never_exceed_limit() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Ada Lovelace", Some(Plan::new("Duo", 2, 3)));
    let token = app.token_for(id);

    let mut a = helpers::connect_ok(addr, &token, "A").await;
    let mut b = helpers::connect_ok(addr, &token, "B").await;
    helpers::next_json(&mut a).await;
    helpers::next_json(&mut b).await;

    for _ in 0..4 {
        helpers::send_task_complete(&mut a).await;
        helpers::send_task_complete(&mut b).await;
    }

    let subscribers = app.subscribers.clone();
    helpers::eventually(|| {
        subscribers
            .get(id)
            .is_some_and(|s| s.daily_usage == 3)
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(app.subscribers.get(id).expect("subscriber").daily_usage, 3);
}

#[tokio::test]
async fn test_storage_failure_reports_error_and_keeps_connection() {
    let app = TestApp::new();
    let addr = app.spawn().await;
    let id = app.subscriber("Ada Lovelace", None);
    let token = app.token_for(id);

    let mut ws = helpers::connect_ok(addr, &token, "A").await;
    helpers::next_json(&mut ws).await;

    app.subscribers.set_fail_writes(true);
    helpers::send_task_complete(&mut ws).await;
    assert_eq!(helpers::next_json(&mut ws).await["type"], "error");

    app.subscribers.set_fail_writes(false);
    helpers::send_task_complete(&mut ws).await;
    let update = helpers::next_json(&mut ws).await;
    assert_eq!(update["type"], "update_usage");
    assert_eq!(update["dailyUsage"], 1);
}
