//! Integration tests for HTTP notification delivery.
//!
//! Uses wiremock to simulate ntfy, JSON webhook and Mattermost endpoints.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use postwatch::error::NotifyError;
use postwatch::notify::{
    Alert, AlertLevel, AlertRouter, Destination, DestinationSet, HttpSink, NotificationSink,
    RetryPolicy,
};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const POST_LINK: &str = "https://www.reddit.com/r/hardwareswap/comments/abc/rtx_3090/";

fn fast_sink() -> HttpSink {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create client");
    HttpSink::new(client).with_retry_policy(RetryPolicy {
        max_attempts: 3,
        base: Duration::from_millis(10),
        max: Duration::from_millis(50),
    })
}

/// Rewrite `http://127.0.0.1:PORT` into `<scheme>://127.0.0.1:PORT`.
fn uri_for(server: &MockServer, scheme: &str, rest: &str) -> String {
    let authority = server.uri().trim_start_matches("http://").to_string();
    format!("{}://{}{}", scheme, authority, rest)
}

fn router(notify: &[String], filtered: &[String], error: &[String]) -> AlertRouter {
    let parse = |uris: &[String]| -> Vec<Destination> {
        uris.iter().map(|u| Destination::parse(u).unwrap()).collect()
    };
    let set = DestinationSet::new(parse(notify), parse(filtered), parse(error));
    AlertRouter::new(Arc::new(set), Arc::new(fast_sink()))
}

#[tokio::test]
async fn ntfy_publishes_json_to_server_root() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_json(serde_json::json!({
            "topic": "deals",
            "title": "RTX 3090 Ti FE - $1200",
            "message": "RTX 3090 Ti FE - $1200\nhttps://example.com/p",
            "priority": 4,
            "tags": ["gpu"]
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = uri_for(&mock_server, "ntfy", "/deals?priority=high&tags=gpu");
    let result = fast_sink()
        .deliver(
            &uri,
            "RTX 3090 Ti FE - $1200",
            "RTX 3090 Ti FE - $1200\nhttps://example.com/p",
        )
        .await;

    assert!(result.is_ok(), "delivery failed: {:?}", result);
}

#[tokio::test]
async fn ntfy_credentials_become_basic_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header("authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let authority = mock_server.uri().trim_start_matches("http://").to_string();
    let uri = format!("ntfy://user:pass@{}/deals", authority);

    assert!(fast_sink().deliver(&uri, "t", "b").await.is_ok());
}

#[tokio::test]
async fn router_adds_click_link_to_ntfy_only() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_partial_json(serde_json::json!({
            "topic": "deals",
            "click": POST_LINK
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/hooks/deals"))
        .and(body_json(serde_json::json!({
            "title": "[H] RTX 3090",
            "message": POST_LINK
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let router = router(
        &[
            uri_for(&mock_server, "ntfy", "/deals"),
            uri_for(&mock_server, "json", "/hooks/deals"),
        ],
        &[],
        &[],
    );

    let alert = Alert::new(AlertLevel::Notify, "[H] RTX 3090", POST_LINK).with_link(POST_LINK);
    let report = router.route(&alert).await;

    assert_eq!(report.attempted, 2);
    assert!(report.all_delivered(), "failures: {:?}", report.failures);
}

#[tokio::test]
async fn mattermost_posts_attachment_to_hook() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/errortoken"))
        .and(body_partial_json(serde_json::json!({ "channel": "alerts" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = uri_for(&mock_server, "mmost", "/errortoken?channel=alerts");
    fast_sink()
        .deliver(&uri, "[ERROR]", "Feed error: HTTP 503")
        .await
        .expect("delivery should succeed");

    let requests = mock_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let attachment = &body["attachments"][0];
    assert_eq!(attachment["title"], "[ERROR]");
    assert_eq!(attachment["text"], "Feed error: HTTP 503");
    assert_eq!(attachment["footer"], "postwatch");
}

#[tokio::test]
async fn retry_on_server_error_then_success() {
    let mock_server = MockServer::start().await;

    let request_count = Arc::new(AtomicU32::new(0));
    let request_count_clone = request_count.clone();

    Mock::given(method("POST"))
        .and(path("/hooks/retry"))
        .respond_with(move |_req: &wiremock::Request| {
            let count = request_count_clone.fetch_add(1, Ordering::SeqCst);
            if count == 0 {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200)
            }
        })
        .expect(2)
        .mount(&mock_server)
        .await;

    let uri = uri_for(&mock_server, "json", "/hooks/retry");
    let result = fast_sink().deliver(&uri, "t", "b").await;

    assert!(result.is_ok());
    assert_eq!(request_count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let uri = uri_for(&mock_server, "json", "/hooks/down");
    let result = fast_sink().deliver(&uri, "t", "b").await;

    match result {
        Err(NotifyError::SendFailed(message)) => {
            assert!(message.contains("gave up after 3 attempts"), "{}", message);
            assert!(message.contains("503"), "{}", message);
        }
        other => panic!("expected SendFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn client_error_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/badtoken"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&mock_server)
        .await;

    let uri = uri_for(&mock_server, "mmost", "/badtoken");
    let result = fast_sink().deliver(&uri, "t", "b").await;

    match result {
        Err(NotifyError::SendFailed(message)) => {
            assert!(message.contains("client error"), "{}", message);
        }
        other => panic!("expected SendFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn one_failing_destination_does_not_block_others() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/hooks/ok"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/hooks/broken"))
        .respond_with(ResponseTemplate::new(400))
        .expect(1)
        .mount(&mock_server)
        .await;

    let router = router(
        &[
            uri_for(&mock_server, "json", "/hooks/broken"),
            uri_for(&mock_server, "json", "/hooks/ok"),
        ],
        &[],
        &[],
    );

    let report = router
        .route(&Alert::new(AlertLevel::Notify, "title", "body"))
        .await;

    assert_eq!(report.attempted, 2);
    assert_eq!(report.delivered, 1);
    assert_eq!(report.failures.len(), 1);
    assert!(!report.failures[0].destination.contains("broken"));
}

#[tokio::test]
async fn self_test_reaches_every_level() {
    let mock_server = MockServer::start().await;

    for (hook, level) in [("n", "notify"), ("f", "filter"), ("e", "error")] {
        Mock::given(method("POST"))
            .and(path(format!("/hooks/{}", hook)))
            .and(body_json(serde_json::json!({
                "title": "Test",
                "message": format!("This is a startup message at {} level", level)
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;
    }

    let router = router(
        &[uri_for(&mock_server, "json", "/hooks/n")],
        &[uri_for(&mock_server, "json", "/hooks/f")],
        &[uri_for(&mock_server, "json", "/hooks/e")],
    );

    let failures = router.self_test().await;
    assert!(failures.is_empty(), "failures: {:?}", failures);
}

#[tokio::test]
async fn unreachable_destination_reports_failure_without_url() {
    let port = portpicker::pick_unused_port().expect("No free port");
    let uri = format!("json://127.0.0.1:{}/hooks/secret-token", port);

    let router = router(&[], &[], &[uri]);
    let report = router.route(&Alert::error("boom")).await;

    assert_eq!(report.failures.len(), 1);
    let failure = report.failures[0].to_string();
    assert!(failure.starts_with("error -> json://127.0.0.1"), "{}", failure);
    assert!(!failure.contains("secret-token"), "{}", failure);
}
