mod common;

use bulk_uploader::{BatchRequest, HttpTransport, ImageRecord, Transport, TransportError};
use common::{ok_body, serve_script, serve_stalled};
use std::net::TcpListener;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(10);

fn records() -> Vec<ImageRecord> {
    vec![
        ImageRecord::new("a.jpg", b"first", 640, 480),
        ImageRecord::new("b.jpg", b"second", 800, 600),
    ]
}

fn transport(base_url: &str) -> HttpTransport {
    HttpTransport::new(
        format!("{}/api/v1/images/upload-bulk", base_url),
        "secret-token",
        TIMEOUT,
    )
    .unwrap()
}

#[tokio::test]
async fn test_success_response_maps_to_batch_result() {
    let (base_url, requests) = serve_script(vec![(200, ok_body(2, 0))]);
    let images = records();

    let result = transport(&base_url)
        .send_batch(&BatchRequest::new(&images))
        .await
        .unwrap();

    assert_eq!(result.successful, 2);
    assert_eq!(result.failed, 0);

    let request = requests.recv().unwrap();
    let lowered = request.to_lowercase();
    assert!(request.starts_with("POST /api/v1/images/upload-bulk "));
    assert!(lowered.contains("authorization: bearer secret-token"));
    assert!(lowered.contains("content-type: application/json"));
    assert!(request.contains(r#""imageData":"Zmlyc3Q=""#));
    assert!(request.contains(r#""filename":"b.jpg""#));
}

#[tokio::test]
async fn test_payload_too_large_status() {
    let (base_url, _requests) = serve_script(vec![(413, String::new())]);
    let images = records();

    let outcome = transport(&base_url)
        .send_batch(&BatchRequest::new(&images))
        .await;

    assert_eq!(outcome, Err(TransportError::PayloadTooLarge));
}

#[tokio::test]
async fn test_server_error_includes_status_and_body() {
    let (base_url, _requests) = serve_script(vec![(500, "database unavailable".to_string())]);
    let images = records();

    let outcome = transport(&base_url)
        .send_batch(&BatchRequest::new(&images))
        .await;

    match outcome {
        Err(TransportError::Failed(reason)) => {
            assert!(reason.starts_with("HTTP 500"), "unexpected reason: {}", reason);
            assert!(reason.contains("database unavailable"));
        }
        other => panic!("expected a failed batch, got {:?}", other),
    }
}

#[tokio::test]
async fn test_per_item_failures_are_reported() {
    let body = r#"{"successful": 1, "failed": 1, "results": {"successful": [{"filename": "a.jpg"}],
        "failed": [{"filename": "b.jpg", "error": "Invalid crop values"}]}}"#;
    let (base_url, _requests) = serve_script(vec![(200, body.to_string())]);
    let images = records();

    let result = transport(&base_url)
        .send_batch(&BatchRequest::new(&images))
        .await
        .unwrap();

    assert_eq!(result.successful, 1);
    assert_eq!(result.failed, 1);
    assert_eq!(result.failures[0].filename, "b.jpg");
    assert_eq!(result.failures[0].error, "Invalid crop values");
}

#[tokio::test]
async fn test_unparseable_success_body_fails_batch() {
    let (base_url, _requests) = serve_script(vec![(200, "<html>oops</html>".to_string())]);
    let images = records();

    let outcome = transport(&base_url)
        .send_batch(&BatchRequest::new(&images))
        .await;

    assert!(matches!(outcome, Err(TransportError::Failed(_))));
}

#[tokio::test]
async fn test_connection_refused_fails_batch() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let images = records();

    let outcome = transport(&format!("http://{}", addr))
        .send_batch(&BatchRequest::new(&images))
        .await;

    assert!(matches!(outcome, Err(TransportError::Failed(_))));
}

#[tokio::test]
async fn test_request_timeout_fails_batch() {
    let base_url = serve_stalled(Duration::from_secs(5));
    let transport = HttpTransport::new(
        format!("{}/api/v1/images/upload-bulk", base_url),
        "secret-token",
        Duration::from_secs(1),
    )
    .unwrap();
    let images = records();

    let started = Instant::now();
    let outcome = transport.send_batch(&BatchRequest::new(&images)).await;

    match outcome {
        Err(TransportError::Failed(reason)) => {
            assert!(reason.contains("timed out"), "unexpected reason: {}", reason)
        }
        other => panic!("expected a timed out batch, got {:?}", other),
    }
    assert!(started.elapsed() < Duration::from_secs(4));
}
