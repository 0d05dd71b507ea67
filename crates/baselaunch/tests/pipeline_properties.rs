//! Request pipeline behavior on a manual clock
//!
//! Every test drives time through `ManualClock`, so backoff and timeouts are
//! observed as recorded sleeps instead of real waits.

mod common;

use baselaunch::{ApiResult, ClientConfig, JsonValue, ScriptedStep, keys, messages};
use common::harness;
use proptest::prelude::*;
use rstest::rstest;
use serde_json::json;
use std::time::Duration;

fn config(max_retries: u32) -> ClientConfig {
    ClientConfig::builder()
        .origin("https://baselaunch.test")
        .timeout(Duration::from_millis(5_000))
        .max_retries(max_retries)
        .build()
}

#[tokio::test]
async fn test_end_to_end_recovers_after_two_connection_errors() {
    let h = harness(config(2));
    h.transport.push(ScriptedStep::Disconnect("connection refused".into()));
    h.transport.push(ScriptedStep::Disconnect("connection reset".into()));
    h.transport.push(ScriptedStep::json(200, json!({"ok": true})));

    let result = h.runtime.client.get("/api/metrics").await;

    assert_eq!(result, ApiResult::success(json!({"ok": true})));
    assert_eq!(h.transport.call_count(), 3);
    assert_eq!(
        h.clock.sleeps(),
        vec![Duration::from_millis(1_000), Duration::from_millis(2_000)]
    );
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(3)]
#[tokio::test]
async fn test_persistent_failure_makes_r_plus_one_attempts(#[case] max_retries: u32) {
    let h = harness(config(max_retries));
    h.transport.set_fallback(ScriptedStep::status(502));

    let result = h.runtime.client.get("/api/apps").await;

    assert_eq!(result.error(), Some("HTTP 502: Bad Gateway"));
    assert_eq!(h.transport.call_count(), max_retries as usize + 1);
    assert_eq!(h.clock.sleeps().len(), max_retries as usize);
}

#[tokio::test]
async fn test_backoff_doubles_from_one_second() {
    let h = harness(config(4));
    h.transport.set_fallback(ScriptedStep::Disconnect("down".into()));

    let _ = h.runtime.client.get("/api/apps").await;

    let expected: Vec<Duration> = (0..4)
        .map(|k| Duration::from_millis(1_000 * 2u64.pow(k)))
        .collect();
    assert_eq!(h.clock.sleeps(), expected);
}

#[rstest]
#[case(401, "HTTP 401: Unauthorized")]
#[case(403, "HTTP 403: Forbidden")]
#[tokio::test]
async fn test_auth_rejection_short_circuits(#[case] status: u16, #[case] message: &str) {
    let h = harness(config(3));
    h.runtime.store.set(keys::AUTH_TOKEN, "expired-token");
    h.transport.set_fallback(ScriptedStep::status(status));

    let result = h.runtime.client.get("/api/user/profile").await;

    assert_eq!(result.error(), Some(message));
    assert_eq!(h.transport.call_count(), 1);
    assert!(h.clock.sleeps().is_empty());
    assert!(!h.runtime.store.exists(keys::AUTH_TOKEN));
    assert!(
        h.runtime
            .toasts
            .active()
            .iter()
            .any(|t| t.message == messages::SESSION_EXPIRED)
    );
}

#[tokio::test]
async fn test_timeouts_count_as_attempts() {
    let h = harness(config(1));
    h.transport.set_fallback(ScriptedStep::Hang);

    let result = h.runtime.client.get("/api/slow").await;

    assert_eq!(result.error(), Some(messages::TIMEOUT_ERROR));
    assert_eq!(h.transport.call_count(), 2);
    assert_eq!(
        h.clock.sleeps(),
        vec![
            Duration::from_millis(5_000),
            Duration::from_millis(1_000),
            Duration::from_millis(5_000),
        ]
    );
}

#[tokio::test]
async fn test_post_sends_json_body_with_bearer() {
    let h = harness(config(0));
    h.runtime.store.set(keys::AUTH_TOKEN, "demo_jwt_token");
    h.transport.push(ScriptedStep::json(201, json!({"id": 77})));

    let result = h
        .runtime
        .client
        .post("/api/apps/12/reviews", &json!({"rating": 5, "text": "great"}))
        .await;

    assert_eq!(result.data(), Some(&json!({"id": 77})));
    let request = &h.transport.requests()[0];
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "https://baselaunch.test/api/apps/12/reviews");
    assert_eq!(request.header("Authorization"), Some("Bearer demo_jwt_token"));
    let sent: JsonValue = serde_json::from_slice(request.body.as_deref().unwrap()).unwrap();
    assert_eq!(sent, json!({"rating": 5, "text": "great"}));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn prop_attempts_and_sleeps_follow_retry_budget(max_retries in 0u32..6, failures in 0usize..8) {
        let (result, calls, sleeps) = tokio_test::block_on(async {
            let h = harness(config(max_retries));
            for _ in 0..failures {
                h.transport.push(ScriptedStep::Disconnect("flaky".into()));
            }
            h.transport.set_fallback(ScriptedStep::json(200, json!("ok")));
            let result = h.runtime.client.get("/api/apps").await;
            (result, h.transport.call_count(), h.clock.sleeps())
        });

        let budget = max_retries as usize + 1;
        if failures < budget {
            prop_assert!(result.is_success());
            prop_assert_eq!(calls, failures + 1);
        } else {
            prop_assert!(!result.is_success());
            prop_assert_eq!(calls, budget);
        }
        for (k, delay) in sleeps.iter().enumerate() {
            prop_assert_eq!(*delay, Duration::from_millis(1_000 << k));
        }
    }
}
