use artifact_hooks::server::{RELOAD_FAILURE_PREFIX, RELOAD_SUCCESS_MESSAGE};
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

#[path = "../helpers/mod.rs"]
mod helpers;
use helpers::{
    app::TestAppBuilder, recording_sender::RecordingSender, write_subscriptions, EXAMPLE_SUBSCRIPTIONS,
};

#[tokio::test]
async fn test_inbound_event_is_delivered_to_subscribers() {
    let (_dir, path) = write_subscriptions(EXAMPLE_SUBSCRIPTIONS);
    let sender = RecordingSender::new();
    let app = TestAppBuilder::new()
        .with_subscriptions(&path)
        .with_sender(sender.clone())
        .start()
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .post(app.url("/webhooks/events"))
        .json(&json!({
            "repository": {"id": "releases", "name": "Releases"},
            "path": "com/example/app/2.0/app-2.0.jar",
            "user": "deployer",
            "timestamp": 1_700_000_000_000i64
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"accepted": true}));

    let deliveries = sender.wait_for(5, Duration::from_secs(5)).await;
    assert_eq!(deliveries.len(), 5);
    let payload: Value = serde_json::from_str(&deliveries[0].payload).unwrap();
    assert_eq!(payload["user"], "deployer");
    assert_eq!(payload["artifact"]["version"], "2.0");

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_checksum_event_is_not_accepted() {
    let (_dir, path) = write_subscriptions(EXAMPLE_SUBSCRIPTIONS);
    let sender = RecordingSender::new();
    let app = TestAppBuilder::new()
        .with_subscriptions(&path)
        .with_sender(sender.clone())
        .start()
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .post(app.url("/webhooks/events"))
        .json(&json!({
            "repository": {"id": "releases", "name": "Releases"},
            "path": "com/example/app/2.0/app-2.0.jar.sha1"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.json::<Value>().await.unwrap(), json!({"accepted": false}));

    app.shutdown(Duration::from_secs(5)).await.unwrap();
    assert!(sender.deliveries().is_empty());
}

#[tokio::test]
async fn test_reload_endpoint() {
    let (dir, path) = write_subscriptions("releases = http://h/old/\n");
    let app = TestAppBuilder::new()
        .with_subscriptions(&path)
        .with_sender(RecordingSender::new())
        .start()
        .await
        .unwrap();
    let client = reqwest::Client::new();

    std::fs::write(&path, "releases = http://h/new/\n").unwrap();
    let response = client.get(app.url("/webhooks/configuration/reload")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), RELOAD_SUCCESS_MESSAGE);
    assert_eq!(app.store.lookup("releases"), vec!["http://h/new/"]);

    std::fs::remove_file(&path).unwrap();
    let response = client.post(app.url("/webhooks/configuration/reload")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.text().await.unwrap().starts_with(RELOAD_FAILURE_PREFIX));
    assert_eq!(app.store.lookup("releases"), vec!["http://h/new/"]);

    drop(dir);
    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_fake_event_endpoint() {
    let (_dir, path) = write_subscriptions("snapshots = http://h/snapshots/\n");
    let sender = RecordingSender::new();
    let app = TestAppBuilder::new()
        .with_subscriptions(&path)
        .with_sender(sender.clone())
        .start()
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .get(app.url("/webhooks/fakeEvent?r=snapshots&g=com.example&a=app&v=1.0-SNAPSHOT&c=tests&e=jar"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    let event: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(event["user"], "fake");
    assert_eq!(event["repository"], json!({"id": "snapshots", "name": "snapshots"}));
    assert_eq!(event["artifact"]["name"], "app-1.0-SNAPSHOT-tests.jar");
    assert_eq!(event["artifact"]["snapshot"], true);
    assert_eq!(event["artifact"]["snapshotBuildNumber"], 42);

    let deliveries = sender.wait_for(1, Duration::from_secs(5)).await;
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].url, "http://h/snapshots/");
    assert_eq!(deliveries[0].payload, body);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_fake_event_requires_coordinates() {
    let (_dir, path) = write_subscriptions("");
    let app = TestAppBuilder::new()
        .with_subscriptions(&path)
        .with_sender(RecordingSender::new())
        .start()
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .post(app.url("/webhooks/fakeEvent?r=releases&g=com.example&v=1.0&e=jar"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}

#[tokio::test]
async fn test_missing_subscriptions_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let sender = RecordingSender::new();
    let app = TestAppBuilder::new()
        .with_subscriptions(&dir.path().join("absent.properties"))
        .with_sender(sender.clone())
        .start()
        .await
        .unwrap();

    let response = reqwest::Client::new()
        .get(app.url("/webhooks/fakeEvent?r=releases&g=g&a=a&v=1&e=jar"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
    assert!(sender.deliveries().is_empty());
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (_dir, path) = write_subscriptions("releases = http://h/r/\n");
    let sender = RecordingSender::new();
    let app = TestAppBuilder::new()
        .with_subscriptions(&path)
        .with_sender(sender.clone())
        .with_metrics()
        .start()
        .await
        .unwrap();
    let client = reqwest::Client::new();

    client
        .get(app.url("/webhooks/fakeEvent?r=releases&g=g&a=a&v=1&e=jar"))
        .send()
        .await
        .unwrap();
    sender.wait_for(1, Duration::from_secs(5)).await;
    // Deliveries are recorded right after the sender returns.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let response = client.get(app.url("/metrics")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response.text().await.unwrap();
    assert!(body.contains("notifications_total"), "{}", body);
    assert!(body.contains("deliveries_total"), "{}", body);

    app.shutdown(Duration::from_secs(5)).await.unwrap();
}
