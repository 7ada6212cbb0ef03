//! Contract Test: Client-Owned Retry Policy
//!
//! Verifies which failures the update client retries and how attempts are
//! counted.
//!
//! Constraints verified:
//! - Timeouts, network errors and 5xx responses are retried up to
//!   `max_attempts`
//! - 4xx responses, malformed bodies and provider-reported failures are
//!   returned after exactly one attempt
//! - `attempts` on the outcome always equals the requests actually sent
//! - The endpoint's auth token is sent on every attempt

mod common;

use common::*;
use ddns_refresh_core::{FailureKind, RetryPolicy, UpdateClient};
use std::time::Duration;

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let transport = ScriptedTransport::new()
        .script(
            "host-a",
            vec![
                Step::status(401, "Unauthorized"),
                Step::ok(success_body("host-a", "good")),
            ],
        )
        .into_arc();
    let client = UpdateClient::new(transport.clone(), fast_policy());

    let outcome = client.update(&endpoint("host-a")).await;

    assert!(!outcome.success());
    assert_eq!(outcome.attempts(), 1);
    assert_eq!(outcome.failure(), Some(FailureKind::Permanent));
    assert_eq!(outcome.message(), "HTTP 401: Unauthorized");
    assert_eq!(transport.calls("host-a"), 1);
}

#[tokio::test]
async fn timeout_then_success_takes_two_attempts() {
    let transport = ScriptedTransport::new()
        .script(
            "host-a",
            vec![Step::Hang, Step::ok(success_body("host-a", "good"))],
        )
        .into_arc();
    let client = UpdateClient::new(transport.clone(), fast_policy());

    let outcome = client
        .update(&endpoint_with_timeout("host-a", Duration::from_millis(50)))
        .await;

    assert!(outcome.success());
    assert_eq!(outcome.attempts(), 2);
    assert_eq!(outcome.message(), "good");
    assert!(outcome.duration_taken() >= Duration::from_millis(50));
    assert_eq!(transport.calls("host-a"), 2);
}

#[tokio::test]
async fn server_errors_are_retried_until_success() {
    let transport = ScriptedTransport::new()
        .script(
            "host-a",
            vec![
                Step::status(503, "Service Unavailable"),
                Step::status(503, "Service Unavailable"),
                Step::ok(success_body("host-a", "good")),
            ],
        )
        .into_arc();
    let client = UpdateClient::new(transport.clone(), fast_policy());

    let outcome = client.update(&endpoint("host-a")).await;

    assert!(outcome.success());
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(outcome.failure(), None);
}

#[tokio::test]
async fn exhausted_retries_report_last_error() {
    let transport = ScriptedTransport::new()
        .script(
            "host-a",
            vec![
                Step::Fail("connection refused".to_string()),
                Step::status(502, "Bad Gateway"),
                Step::status(503, "Service Unavailable"),
                Step::ok(success_body("host-a", "never sent")),
            ],
        )
        .into_arc();
    let client = UpdateClient::new(transport.clone(), fast_policy());

    let outcome = client.update(&endpoint("host-a")).await;

    assert!(!outcome.success());
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(outcome.failure(), Some(FailureKind::Transient));
    assert_eq!(outcome.message(), "HTTP 503: Service Unavailable");
    assert_eq!(transport.calls("host-a"), 3);
}

#[tokio::test]
async fn malformed_response_is_not_retried() {
    let transport = ScriptedTransport::new()
        .script("host-a", vec![Step::ok("<html>maintenance</html>")])
        .into_arc();
    let client = UpdateClient::new(transport.clone(), fast_policy());

    let outcome = client.update(&endpoint("host-a")).await;

    assert!(!outcome.success());
    assert_eq!(outcome.attempts(), 1);
    assert_eq!(outcome.failure(), Some(FailureKind::Malformed));
    assert!(outcome.message().starts_with("malformed response:"));
}

#[tokio::test]
async fn provider_reported_failure_is_not_retried() {
    let transport = ScriptedTransport::new()
        .script(
            "host-a",
            vec![Step::ok(
                r#"{"success": false, "error": "Failed to update DNS services", "details": "quota exceeded"}"#,
            )],
        )
        .into_arc();
    let client = UpdateClient::new(transport.clone(), fast_policy());

    let outcome = client.update(&endpoint("host-a")).await;

    assert!(!outcome.success());
    assert_eq!(outcome.attempts(), 1);
    assert_eq!(outcome.failure(), Some(FailureKind::Application));
    assert_eq!(
        outcome.message(),
        "Failed to update DNS services: quota exceeded"
    );
}

#[tokio::test]
async fn single_attempt_policy_never_retries() {
    let transport = ScriptedTransport::new()
        .script("host-a", vec![Step::Hang])
        .into_arc();
    let client = UpdateClient::new(transport.clone(), RetryPolicy::no_retry());

    let outcome = client
        .update(&endpoint_with_timeout("host-a", Duration::from_millis(20)))
        .await;

    assert!(!outcome.success());
    assert_eq!(outcome.attempts(), 1);
    assert_eq!(outcome.failure(), Some(FailureKind::Transient));
    assert!(outcome.message().starts_with("request timed out after"));
}

#[tokio::test]
async fn auth_token_is_sent_on_every_attempt() {
    let transport = ScriptedTransport::new()
        .script(
            "host-a",
            vec![
                Step::status(500, "oops"),
                Step::ok(success_body("host-a", "good")),
            ],
        )
        .into_arc();
    let client = UpdateClient::new(transport.clone(), fast_policy());

    client.update(&endpoint("host-a")).await;

    assert_eq!(transport.tokens(), vec!["token-host-a", "token-host-a"]);
}
