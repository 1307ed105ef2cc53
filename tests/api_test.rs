use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use chat_load_test::config::Config;
use chat_load_test::server::{build_router, AppState};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

async fn spawn_app(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Stub chat endpoint standing in for the gateway under load.
async fn spawn_stub_chat(hits: Arc<AtomicUsize>, fail: Arc<AtomicBool>) -> SocketAddr {
    let app = Router::new().route(
        "/api/chat",
        post(move |Json(_body): Json<Value>| {
            let hits = hits.clone();
            let fail = fail.clone();
            async move {
                hits.fetch_add(1, Ordering::Relaxed);
                if fail.load(Ordering::Relaxed) {
                    Err((StatusCode::INTERNAL_SERVER_ERROR, "stub failure"))
                } else {
                    Ok(Json(json!({ "content": "stub reply" })))
                }
            }
        }),
    );
    spawn_app(app).await
}

/// Stub upstream LLM speaking the chat-completions shape.
async fn spawn_stub_llm() -> SocketAddr {
    let app = Router::new().route(
        "/invocations",
        post(|Json(_body): Json<Value>| async move {
            Json(json!({ "choices": [{ "message": { "content": "llm reply" } }] }))
        }),
    );
    spawn_app(app).await
}

struct TestHarness {
    base_url: String,
    chat_hits: Arc<AtomicUsize>,
    chat_fail: Arc<AtomicBool>,
    client: reqwest::Client,
}

/// Boot the API with stub chat and LLM upstreams on ephemeral ports.
async fn spawn_api() -> TestHarness {
    let chat_hits = Arc::new(AtomicUsize::new(0));
    let chat_fail = Arc::new(AtomicBool::new(false));
    let chat_addr = spawn_stub_chat(chat_hits.clone(), chat_fail.clone()).await;
    let llm_addr = spawn_stub_llm().await;

    let mut config = Config::default();
    config.llm_endpoint = format!("http://{}/invocations", llm_addr);
    config.target_url = Some(format!("http://{}/api/chat", chat_addr));
    config.request_timeout = 2;

    let state = AppState::from_config(config).unwrap();
    let addr = spawn_app(build_router(state)).await;

    TestHarness {
        base_url: format!("http://{}", addr),
        chat_hits,
        chat_fail,
        client: reqwest::Client::new(),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_health_check() {
    let harness = spawn_api().await;
    let response = harness
        .client
        .get(format!("{}/api", harness.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert!(body.get("message").is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_chat_endpoint_returns_content() {
    let harness = spawn_api().await;
    let response = harness
        .client
        .post(format!("{}/api/chat", harness.base_url))
        .json(&json!({ "message": "Hello, how are you?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["content"], "llm reply");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_chat_rejects_unknown_field() {
    let harness = spawn_api().await;
    let response = harness
        .client
        .post(format!("{}/api/chat", harness.base_url))
        .json(&json!({ "invalid_field": "This should fail" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body.get("content").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_chat_rejects_empty_body_object() {
    let harness = spawn_api().await;
    let response = harness
        .client
        .post(format!("{}/api/chat", harness.base_url))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_test_endpoint_returns_full_summary() {
    let harness = spawn_api().await;
    let response = harness
        .client
        .get(format!(
            "{}/api/load-test?users=4&spawn_rate=4&test_time=1",
            harness.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    for field in [
        "test_duration",
        "total_requests",
        "successful_requests",
        "failed_requests",
        "requests_per_second",
        "concurrent_users",
        "response_time",
    ] {
        assert!(body.get(field).is_some(), "missing field {}", field);
    }

    assert_eq!(body["concurrent_users"], 4);
    let total = body["total_requests"].as_u64().unwrap();
    let success = body["successful_requests"].as_u64().unwrap();
    let failed = body["failed_requests"].as_u64().unwrap();
    assert_eq!(total, success + failed);
    assert!(total > 0);

    let duration = body["test_duration"].as_f64().unwrap();
    let rps = body["requests_per_second"].as_f64().unwrap();
    assert!((rps - total as f64 / duration).abs() < 1e-6);

    // The harness actually drove traffic at the stub chat endpoint
    assert!(harness.chat_hits.load(Ordering::Relaxed) > 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_test_negative_users_rejected_without_traffic() {
    let harness = spawn_api().await;
    let response = harness
        .client
        .get(format!(
            "{}/api/load-test?users=-1&spawn_rate=2&test_time=5",
            harness.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body.get("error").is_some());

    // Invalid input starts no run and generates no chat traffic
    assert_eq!(harness.chat_hits.load(Ordering::Relaxed), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_test_rejects_out_of_range_parameters() {
    let harness = spawn_api().await;
    for query in [
        "users=0&spawn_rate=2&test_time=5",
        "users=4&spawn_rate=0&test_time=5",
        "users=4&spawn_rate=-1&test_time=5",
        "users=4&spawn_rate=2&test_time=0",
        "users=4&spawn_rate=2&test_time=-3",
    ] {
        let response = harness
            .client
            .get(format!("{}/api/load-test?{}", harness.base_url, query))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400, "query '{}' should be rejected", query);
    }
    assert_eq!(harness.chat_hits.load(Ordering::Relaxed), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_test_rejects_missing_parameter() {
    let harness = spawn_api().await;
    let response = harness
        .client
        .get(format!(
            "{}/api/load-test?users=4&spawn_rate=2",
            harness.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_test_repeated_requests_are_independent() {
    let harness = spawn_api().await;
    let url = format!(
        "{}/api/load-test?users=2&spawn_rate=4&test_time=1",
        harness.base_url
    );

    let first = harness.client.get(&url).send().await.unwrap();
    assert_eq!(first.status(), 200);
    let first_body: Value = first.json().await.unwrap();

    let second = harness.client.get(&url).send().await.unwrap();
    assert_eq!(second.status(), 200);
    let second_body: Value = second.json().await.unwrap();

    // Each run aggregates only its own outcomes, not a running total
    let first_total = first_body["total_requests"].as_u64().unwrap();
    let second_total = second_body["total_requests"].as_u64().unwrap();
    assert!(first_total > 0);
    assert!(second_total > 0);
    assert!(
        second_total < first_total * 3,
        "second run ({}) looks like an accumulated total over the first ({})",
        second_total,
        first_total
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_test_with_failing_gateway_still_returns_200() {
    let harness = spawn_api().await;
    harness.chat_fail.store(true, Ordering::Relaxed);

    let response = harness
        .client
        .get(format!(
            "{}/api/load-test?users=2&spawn_rate=4&test_time=1",
            harness.base_url
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    let total = body["total_requests"].as_u64().unwrap();
    assert!(total > 0);
    assert_eq!(body["failed_requests"].as_u64().unwrap(), total);
    assert_eq!(body["successful_requests"].as_u64().unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cors_allows_any_origin() {
    let harness = spawn_api().await;
    let response = harness
        .client
        .get(format!("{}/api", harness.base_url))
        .header("Origin", "http://example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .map(|v| v.to_str().unwrap()),
        Some("*")
    );
}
