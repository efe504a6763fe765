//! End-to-end runs through `HttpTransport` against a mock HTTP server.

use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use vidgen_client::api::HttpTransport;
use vidgen_client::{CancellationToken, JobOrchestrator, RunOptions};
use vidgen_core::error::JobError;
use vidgen_core::retry::RetryPolicy;
use vidgen_core::types::JobRequest;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn orchestrator(server: &MockServer) -> JobOrchestrator<HttpTransport> {
    let transport = HttpTransport::new(server.uri(), "test-key", Duration::from_secs(5)).unwrap();
    JobOrchestrator::new(transport).with_retry_policy(RetryPolicy {
        initial_delay: Duration::from_millis(10),
        jitter: 0.0,
        ..Default::default()
    })
}

fn fast() -> RunOptions {
    RunOptions::new(Duration::from_millis(20), Duration::from_secs(10))
}

#[tokio::test]
async fn run_to_completion_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/video/generate"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_json(json!({
            "model": "demo",
            "prompt": "lake at sunrise",
            "duration": "5s",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"job_id": "q-1"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    // Mounted first, so it answers until exhausted.
    Mock::given(method("POST"))
        .and(path("/api/video/status"))
        .and(body_json(json!({"job_id": "q-1", "model": "demo"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "PROCESSING"})))
        .up_to_n_times(2)
        .expect(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/video/status"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"B".to_vec(), "video/mp4"))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/video/complete"))
        .and(body_json(json!({"job_id": "q-1", "model": "demo"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let result = orchestrator(&mock_server)
        .run_to_completion(
            &JobRequest::new("demo", "lake at sunrise", "5s"),
            &fast(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.bytes, b"B".to_vec());
    assert_eq!(result.media_type, "video/mp4");
    assert_eq!(result.file_extension(), "mp4");
}

#[tokio::test]
async fn quote_over_http() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/video/quote"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"cost": 0.75, "currency": "USD"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let quote = orchestrator(&mock_server)
        .quote(&JobRequest::new("demo", "lake at sunrise", "5s").with_resolution("720p"))
        .await
        .unwrap();

    assert_eq!(quote.price, 0.75);
    assert_eq!(quote.raw["currency"], "USD");
}

#[tokio::test]
async fn payment_required_is_surfaced_without_retry() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/video/generate"))
        .respond_with(ResponseTemplate::new(402).set_body_json(json!({"error": "insufficient balance"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = orchestrator(&mock_server)
        .run_to_completion(
            &JobRequest::new("demo", "lake at sunrise", "5s"),
            &fast(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_matches!(err, JobError::PaymentRequired { message, .. } if message == "insufficient balance");
}

#[tokio::test]
async fn complete_on_unknown_job_is_already_released() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/video/complete"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not found"})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let orchestrator = orchestrator(&mock_server);
    let handle = vidgen_core::types::JobHandle::new("gone", "demo");

    for _ in 0..2 {
        let ack = orchestrator.complete(&handle).await.unwrap();
        assert_eq!(ack, vidgen_core::types::Ack::AlreadyReleased);
    }
}
