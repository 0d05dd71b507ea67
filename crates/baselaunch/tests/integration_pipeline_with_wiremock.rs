//! Integration tests for the request pipeline over real HTTP using wiremock

mod common;

use baselaunch::storage::{KeyValueStore, MemoryBackend};
use baselaunch::{ApiClient, ApiResult, ClientConfig, SystemClock, keys};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, max_retries: u32) -> (ApiClient, Arc<KeyValueStore>) {
    let store = Arc::new(KeyValueStore::new(
        Arc::new(MemoryBackend::new()),
        Arc::new(SystemClock),
    ));
    let config = ClientConfig::builder()
        .origin(server.uri())
        .timeout(Duration::from_millis(500))
        .max_retries(max_retries)
        .initial_backoff(Duration::from_millis(10))
        .build();
    let client = ApiClient::builder()
        .config(config)
        .store(store.clone())
        .build()
        .expect("Failed to build client");
    (client, store)
}

#[tokio::test]
async fn test_get_apps_with_bearer() {
    let mock_server = MockServer::start().await;
    let body = common::load_response_fixture("apps");

    Mock::given(method("GET"))
        .and(path("/api/apps"))
        .and(header("authorization", "Bearer demo_jwt_token"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, store) = client_for(&mock_server, 0);
    store.set(keys::AUTH_TOKEN, "demo_jwt_token");

    let result = client.get("/api/apps").await;
    let data = result.data().expect("request failed");
    assert_eq!(data["total"], 2);
    assert_eq!(data["apps"][0]["name"], "Frame Wallet");

    mock_server.verify().await;
}

#[tokio::test]
async fn test_put_sends_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/user/stack"))
        .and(body_json(json!({"apps": [1, 2, 3]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"saved": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _) = client_for(&mock_server, 0);
    let result = client
        .put("/api/user/stack", &json!({"apps": [1, 2, 3]}))
        .await;
    assert_eq!(result, ApiResult::success(json!({"saved": true})));
}

#[tokio::test]
async fn test_retries_until_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/metrics"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/metrics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, _) = client_for(&mock_server, 3);
    let result = client.get("/api/metrics").await;
    assert_eq!(result, ApiResult::success(json!({"ok": true})));

    mock_server.verify().await;
}

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/user/profile"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (client, store) = client_for(&mock_server, 3);
    store.set(keys::AUTH_TOKEN, "stale");

    let result = client.get("/api/user/profile").await;
    assert_eq!(result.error(), Some("HTTP 401: Unauthorized"));
    assert!(!store.exists(keys::AUTH_TOKEN));

    mock_server.verify().await;
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let (client, _) = client_for(&mock_server, 0);
    let result = client.get("/api/slow").await;
    assert_eq!(result.error(), Some("Request timed out. Please try again."));
}

#[tokio::test]
async fn test_empty_and_invalid_bodies() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/stack/4"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/broken"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let (client, _) = client_for(&mock_server, 1);
    assert_eq!(
        client.delete("/api/stack/4").await,
        ApiResult::success(Value::Null)
    );

    let broken = client.get("/api/broken").await;
    assert!(
        broken
            .error()
            .is_some_and(|e| e.starts_with("Failed to parse response"))
    );

    mock_server.verify().await;
}

#[tokio::test]
async fn test_unreachable_origin_reports_network_error() {
    let config = ClientConfig::builder()
        .origin("http://127.0.0.1:1")
        .max_retries(1)
        .initial_backoff(Duration::from_millis(5))
        .build();
    let client = ApiClient::builder().config(config).build().unwrap();

    let result = client.get("/api/apps").await;
    assert!(
        result
            .error()
            .is_some_and(|e| e.starts_with("Network error"))
    );
}
