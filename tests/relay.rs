use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceExt;

use chat_relay::app::build_app;
use chat_relay::prompt::SYSTEM_PROMPT;
use chat_relay::rate_limit::RateLimiter;
use chat_relay::state::AppState;
use chat_relay::upstream::Upstream;

const COMPLETION: &str = r#"{"id":"cmpl-1","object":"chat.completion","choices":[{"index":0,"message":{"role":"assistant","content":"What is the project about?"},"finish_reason":"stop"}]}"#;

/// Fake chat-completion API answering every call with `status` and `body`.
struct FakeUpstream {
    url: String,
    calls: Arc<AtomicUsize>,
    last: Arc<Mutex<Option<(HeaderMap, Value)>>>,
    handle: tokio::task::JoinHandle<()>,
}

impl Drop for FakeUpstream {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn spawn_upstream(status: StatusCode, body: &'static str) -> FakeUpstream {
    let calls = Arc::new(AtomicUsize::new(0));
    let last = Arc::new(Mutex::new(None));

    let (route_calls, route_last) = (calls.clone(), last.clone());
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move |headers: HeaderMap, Json(v): Json<Value>| {
            let calls = route_calls.clone();
            let last = route_last.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                *last.lock().unwrap() = Some((headers, v));
                (status, body)
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    FakeUpstream {
        url: format!("http://{addr}/v1/chat/completions"),
        calls,
        last,
        handle,
    }
}

fn relay(url: &str, api_key: Option<&str>, enforce: bool, daily_limit: u32) -> (Router, Arc<AppState>) {
    let upstream = Upstream::new(
        url,
        "deepseek-chat",
        api_key.map(str::to_string),
        Duration::from_secs(5),
    )
    .unwrap();
    let state = Arc::new(AppState {
        upstream,
        rate_limiter: RateLimiter::new(daily_limit),
        enforce_rate_limit: enforce,
    });
    (build_app(state.clone()), state)
}

fn chat(body: impl Into<Body>, client: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .header("x-forwarded-for", client)
        .body(body.into())
        .unwrap()
}

fn conversation() -> String {
    json!({"messages": [{"role": "user", "content": "I need an online shop"}]}).to_string()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(request).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, bytes) = send(app, request).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_is_ok() {
    let (app, _) = relay("http://127.0.0.1:9/unused", None, false, 10);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send_json(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn messages_must_be_an_array() {
    let upstream = spawn_upstream(StatusCode::OK, COMPLETION).await;
    let (app, _) = relay(&upstream.url, Some("sk-test"), false, 10);

    for body in [
        r#"{"messages": "not-an-array"}"#,
        r#"{"messages": null}"#,
        r#"{}"#,
        r#"[1, 2, 3]"#,
        "not json at all",
    ] {
        let (status, json) = send_json(&app, chat(body, "1.2.3.4")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert!(json["error"].is_string());
    }
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn missing_credential_makes_no_outbound_call() {
    let upstream = spawn_upstream(StatusCode::OK, COMPLETION).await;
    let (app, _) = relay(&upstream.url, None, false, 10);

    let (status, json) = send_json(&app, chat(conversation(), "1.2.3.4")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["error"].is_string());
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn blank_credential_counts_as_missing() {
    let upstream = spawn_upstream(StatusCode::OK, COMPLETION).await;
    let (app, _) = relay(&upstream.url, Some("  "), false, 10);

    let (status, _) = send(&app, chat(conversation(), "1.2.3.4")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn upstream_error_status_and_body_are_relayed() {
    let upstream = spawn_upstream(StatusCode::TOO_MANY_REQUESTS, "rate limited").await;
    let (app, _) = relay(&upstream.url, Some("sk-test"), false, 10);

    let (status, json) = send_json(&app, chat(conversation(), "1.2.3.4")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(json["error"].is_string());
    assert_eq!(json["details"], "rate limited");
    // no retry
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn success_is_passed_through_verbatim() {
    let upstream = spawn_upstream(StatusCode::OK, COMPLETION).await;
    let (app, _) = relay(&upstream.url, Some("sk-test"), false, 10);

    let (status, body) = send(&app, chat(conversation(), "1.2.3.4")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, COMPLETION.as_bytes());

    let (headers, sent) = upstream.last.lock().unwrap().clone().unwrap();
    assert_eq!(headers["authorization"], "Bearer sk-test");
    assert_eq!(sent["model"], "deepseek-chat");
    assert_eq!(sent["stream"], false);

    let messages = sent["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0], json!({"role": "system", "content": SYSTEM_PROMPT}));
    assert_eq!(messages[1], json!({"role": "user", "content": "I need an online shop"}));
}

#[tokio::test]
async fn invalid_upstream_json_is_an_internal_error() {
    let upstream = spawn_upstream(StatusCode::OK, "<html>oops</html>").await;
    let (app, _) = relay(&upstream.url, Some("sk-test"), false, 10);

    let (status, json) = send_json(&app, chat(conversation(), "1.2.3.4")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "Internal server error");
    assert!(json["message"].is_string());
}

#[tokio::test]
async fn unreachable_upstream_is_an_internal_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{addr}/v1/chat/completions");
    let (app, _) = relay(&url, Some("sk-test"), false, 10);

    let (status, json) = send_json(&app, chat(conversation(), "1.2.3.4")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json["message"].is_string());

    // still serving
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn quota_is_not_touched_when_not_enforced() {
    let upstream = spawn_upstream(StatusCode::OK, COMPLETION).await;
    let (app, state) = relay(&upstream.url, Some("sk-test"), false, 1);

    for _ in 0..3 {
        let (status, _) = send(&app, chat(conversation(), "1.2.3.4")).await;
        assert_eq!(status, StatusCode::OK);
    }
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 3);
    assert!(state.rate_limiter.is_empty());
}

#[tokio::test]
async fn enforced_quota_rejects_after_limit() {
    let upstream = spawn_upstream(StatusCode::OK, COMPLETION).await;
    let (app, state) = relay(&upstream.url, Some("sk-test"), true, 2);

    for _ in 0..2 {
        let (status, _) = send(&app, chat(conversation(), "1.2.3.4")).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, json) = send_json(&app, chat(conversation(), "1.2.3.4")).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert!(json["error"].is_string());
    assert_eq!(json["remaining"], 0);
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 2);

    // other clients keep their own quota
    let (status, _) = send(&app, chat(conversation(), "5.6.7.8")).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(state.rate_limiter.check_limit("1.2.3.4").count, 2);
    assert_eq!(state.rate_limiter.check_limit("5.6.7.8").count, 1);
}

#[tokio::test]
async fn failed_forward_does_not_consume_quota() {
    let upstream = spawn_upstream(StatusCode::SERVICE_UNAVAILABLE, "overloaded").await;
    let (app, state) = relay(&upstream.url, Some("sk-test"), true, 1);

    for _ in 0..3 {
        let (status, _) = send(&app, chat(conversation(), "1.2.3.4")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
    assert_eq!(upstream.calls.load(Ordering::SeqCst), 3);
    assert!(state.rate_limiter.check_limit("1.2.3.4").allowed);
}

#[tokio::test]
async fn limit_report_does_not_consume() {
    let upstream = spawn_upstream(StatusCode::OK, COMPLETION).await;
    let (app, _) = relay(&upstream.url, Some("sk-test"), true, 10);

    send(&app, chat(conversation(), "1.2.3.4")).await;

    for _ in 0..2 {
        let request = Request::builder()
            .uri("/api/limit")
            .header("x-forwarded-for", "1.2.3.4, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let (status, json) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["allowed"], true);
        assert_eq!(json["count"], 1);
        assert_eq!(json["remaining"], 9);
        assert_eq!(json["limit"], 10);
        assert_eq!(json["enforced"], true);
        assert!(json["date"].is_string());
    }
}

#[tokio::test]
async fn requests_without_any_address_share_the_unknown_key() {
    let upstream = spawn_upstream(StatusCode::OK, COMPLETION).await;
    let (app, state) = relay(&upstream.url, Some("sk-test"), true, 10);

    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .body(Body::from(conversation()))
        .unwrap();
    let (status, _) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state.rate_limiter.check_limit("unknown").count, 1);
}

#[tokio::test]
async fn metrics_are_exposed() {
    let upstream = spawn_upstream(StatusCode::OK, COMPLETION).await;
    let (app, _) = relay(&upstream.url, Some("sk-test"), false, 10);
    send(&app, chat(conversation(), "1.2.3.4")).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("relay_requests_total"));
}
