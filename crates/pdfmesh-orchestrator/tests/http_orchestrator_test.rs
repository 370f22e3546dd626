//! HTTP Orchestrator Integration Tests
//!
//! These tests run the orchestrator router against mock worker services
//! listening on ephemeral ports.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use pdfmesh_common::{OperationType, ServiceDescriptor, ServiceStatus};
use pdfmesh_orchestrator::{build_router, KnownCandidate, Orchestrator, OrchestratorConfig};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tower::ServiceExt;

// ============================================================================
// Mock Worker
// ============================================================================

#[derive(Clone)]
struct MockState {
    service_id: String,
    operation: OperationType,
    port: u16,
    healthy: Arc<AtomicBool>,
    last_content_type: Arc<Mutex<Option<String>>>,
    hold_started: Arc<Notify>,
    hold_released: Arc<AtomicBool>,
}

/// A mock worker service implementing the worker HTTP contract.
struct MockWorker {
    addr: SocketAddr,
    service_id: String,
    operation: OperationType,
    healthy: Arc<AtomicBool>,
    last_content_type: Arc<Mutex<Option<String>>>,
    hold_started: Arc<Notify>,
    hold_released: Arc<AtomicBool>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockWorker {
    async fn start(service_id: &str, operation: OperationType) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock worker");
        let addr = listener.local_addr().unwrap();

        let healthy = Arc::new(AtomicBool::new(true));
        let last_content_type = Arc::new(Mutex::new(None));
        let hold_started = Arc::new(Notify::new());
        let hold_released = Arc::new(AtomicBool::new(false));
        let state = MockState {
            service_id: service_id.to_string(),
            operation,
            port: addr.port(),
            healthy: healthy.clone(),
            last_content_type: last_content_type.clone(),
            hold_started: hold_started.clone(),
            hold_released: hold_released.clone(),
        };

        let app = Router::new()
            .route("/info", get(info))
            .route("/health", get(health))
            .route("/process", post(process))
            .route("/page-numbers", post(page_numbers))
            .route("/crop", post(crop_rejected))
            .route("/pdf-to-word", post(stall_binary))
            .route("/pdf-to-html", post(stall_json))
            .route("/pdf-to-excel", post(hold))
            .route("/download/:file_name", get(download))
            .with_state(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            service_id: service_id.to_string(),
            operation,
            healthy,
            last_content_type,
            hold_started,
            hold_released,
            _handle: handle,
        }
    }

    fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }

    fn candidate(&self) -> KnownCandidate {
        KnownCandidate::new(self.operation, "127.0.0.1", self.addr.port())
    }

    fn last_content_type(&self) -> Option<String> {
        self.last_content_type.lock().unwrap().clone()
    }
}

async fn info(State(state): State<MockState>) -> Json<Value> {
    Json(json!({
        "service_id": state.service_id,
        "name": state.operation.as_str(),
        "version": "1.0.0",
        "description": "mock worker",
        "operation_type": state.operation.as_str(),
        "host": "127.0.0.1",
        "port": state.port,
        "status": "healthy",
        "endpoints": ["/health", "/info", "/upload", "/download/{file_name}", "/process"]
    }))
}

async fn health(State(state): State<MockState>) -> Response {
    if state.healthy.load(Ordering::Relaxed) {
        Json(json!({
            "service_id": state.service_id,
            "status": "healthy",
            "timestamp": "2024-01-01T00:00:00",
            "uptime_seconds": 1.0,
            "version": "1.0.0"
        }))
        .into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "down").into_response()
    }
}

/// Echoes the uploaded body back as a PDF.
async fn process(State(state): State<MockState>, headers: HeaderMap, body: Bytes) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    *state.last_content_type.lock().unwrap() = content_type;

    ([(header::CONTENT_TYPE, "application/pdf")], body).into_response()
}

async fn page_numbers(body: Bytes) -> Json<Value> {
    let request: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Json(json!({
        "success": true,
        "message": "Added page numbers",
        "file_url": "/download/abc.pdf",
        "file_size_mb": 0.1,
        "metadata": {"request": request}
    }))
}

async fn crop_rejected() -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        [(header::CONTENT_TYPE, "application/json")],
        r#"{"detail":"crop box outside page"}"#,
    )
        .into_response()
}

async fn download(Path(file_name): Path<String>) -> Response {
    ([(header::CONTENT_TYPE, "application/pdf")], format!("file:{}", file_name)).into_response()
}

/// Sends the headers and a first chunk, then never finishes the body.
fn stalled_body(content_type: &'static str, first: &'static [u8]) -> Response {
    let chunks = futures::stream::once(async move { Ok::<_, std::io::Error>(Bytes::from_static(first)) })
        .chain(futures::stream::pending());
    ([(header::CONTENT_TYPE, content_type)], Body::from_stream(chunks)).into_response()
}

async fn stall_binary() -> Response {
    stalled_body("application/octet-stream", b"%PDF")
}

async fn stall_json() -> Response {
    stalled_body("application/json", br#"{"success": tr"#)
}

/// Sets a flag when the handler future is dropped.
struct ReleaseFlag(Arc<AtomicBool>);

impl Drop for ReleaseFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Never answers; the handler is only dropped once the connection closes.
async fn hold(State(state): State<MockState>) -> Response {
    let _release = ReleaseFlag(state.hold_released.clone());
    state.hold_started.notify_one();
    std::future::pending::<Response>().await
}

// ============================================================================
// Helpers
// ============================================================================

const BOUNDARY: &str = "XyZpdfmeshBoundary";

fn config_for(workers: &[&MockWorker]) -> OrchestratorConfig {
    OrchestratorConfig {
        host: "127.0.0.1".into(),
        port: 8000,
        candidates: workers.iter().map(|w| w.candidate()).collect(),
        probe_timeout: Duration::from_secs(2),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, data) in files {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"files\"; filename=\"{}\"\r\nContent-Type: application/pdf\r\n\r\n",
                BOUNDARY, name
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn multipart_request(uri: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

fn json_request(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(orchestrator: &Arc<Orchestrator>, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = build_router(orchestrator.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body)
}

fn unreachable_descriptor(id: &str, operation: OperationType, port: u16) -> ServiceDescriptor {
    ServiceDescriptor {
        service_id: id.to_string(),
        name: operation.as_str().to_string(),
        version: "1.0.0".to_string(),
        description: String::new(),
        operation_type: operation,
        host: "127.0.0.1".to_string(),
        port,
        status: ServiceStatus::Healthy,
        endpoints: vec![],
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_discovery_registers_worker() {
    let worker = MockWorker::start("rotate-1a2b3c4d", OperationType::Rotate).await;
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[&worker])).unwrap());

    assert_eq!(orchestrator.discover_now().await, 1);

    let (status, _, body) = send(
        &orchestrator,
        Request::builder().uri("/services/rotate").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let services: Vec<ServiceDescriptor> = serde_json::from_slice(&body).unwrap();
    assert_eq!(services.len(), 1);
    assert_eq!(services[0].service_id, worker.service_id);
    assert_eq!(services[0].port, worker.addr.port());
    assert_eq!(services[0].status, ServiceStatus::Healthy);
}

#[tokio::test]
async fn test_rediscovery_is_idempotent() {
    let worker = MockWorker::start("split-1", OperationType::Split).await;
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[&worker])).unwrap());

    orchestrator.discover_now().await;
    let first = orchestrator.registry().read().await.all();
    orchestrator.discover_now().await;
    let second = orchestrator.registry().read().await.all();

    assert_eq!(first, second);
    assert_eq!(second.len(), 1);
}

#[tokio::test]
async fn test_operation_mismatch_still_registered() {
    let worker = MockWorker::start("rotate-9", OperationType::Rotate).await;
    let mut config = config_for(&[]);
    config.candidates = vec![KnownCandidate::new(OperationType::Merge, "127.0.0.1", worker.addr.port())];
    let orchestrator = Arc::new(Orchestrator::new(config).unwrap());

    orchestrator.discover_now().await;

    let registry = orchestrator.registry();
    let registry = registry.read().await;
    assert_eq!(registry.get("rotate-9").unwrap().operation_type, OperationType::Rotate);
    assert!(registry.list_by_operation(OperationType::Merge).is_empty());
}

#[tokio::test]
async fn test_multipart_bytes_forwarded_unchanged() {
    let worker = MockWorker::start("rotate-1", OperationType::Rotate).await;
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[&worker])).unwrap());
    orchestrator.discover_now().await;

    let payload: Vec<u8> = (0..=255u8).cycle().take(64 * 1024).collect();
    let body = multipart_body(&[("input.pdf", &payload)]);

    let (status, headers, response_body) = send(&orchestrator, multipart_request("/rotate", body.clone())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&response_body[..], &body[..]);
    assert_eq!(headers[header::CONTENT_TYPE], "application/pdf");
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=\"processed_rotate.pdf\""
    );
    assert_eq!(
        worker.last_content_type().as_deref(),
        Some(format!("multipart/form-data; boundary={}", BOUNDARY).as_str())
    );
}

#[tokio::test]
async fn test_merge_attachment_name() {
    let worker = MockWorker::start("merge-1", OperationType::Merge).await;
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[&worker])).unwrap());
    orchestrator.discover_now().await;

    let body = multipart_body(&[("a.pdf", b"%PDF a"), ("b.pdf", b"%PDF b")]);
    let (status, headers, _) = send(&orchestrator, multipart_request("/merge", body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment; filename=\"merged.pdf\"");
}

#[tokio::test]
async fn test_json_response_file_url_rewritten() {
    let worker = MockWorker::start("page_numbers-77", OperationType::PageNumbers).await;
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[&worker])).unwrap());
    orchestrator.discover_now().await;

    let (status, _, body) = send(
        &orchestrator,
        json_request("/page-numbers", json!({"file_name": "in.pdf", "position": "bottom"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body["file_url"],
        "http://127.0.0.1:8000/download/page_numbers-77/abc.pdf"
    );
    assert_eq!(body["message"], "Added page numbers");
    assert_eq!(body["metadata"]["request"]["position"], "bottom");
}

#[tokio::test]
async fn test_download_relay() {
    let worker = MockWorker::start("page_numbers-77", OperationType::PageNumbers).await;
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[&worker])).unwrap());
    orchestrator.discover_now().await;

    let (status, headers, body) = send(
        &orchestrator,
        Request::builder()
            .uri("/download/page_numbers-77/abc.pdf")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"file:abc.pdf");
    assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment; filename=\"abc.pdf\"");
}

#[tokio::test]
async fn test_upstream_error_relayed() {
    let worker = MockWorker::start("crop-1", OperationType::Crop).await;
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[&worker])).unwrap());
    orchestrator.discover_now().await;

    let (status, headers, body) = send(&orchestrator, json_request("/crop", json!({"file_name": "a.pdf"}))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(&body[..], br#"{"detail":"crop box outside page"}"#);
}

#[tokio::test]
async fn test_unreachable_worker_returns_500() {
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[])).unwrap());

    let dead_port = {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    };
    orchestrator
        .registry()
        .write()
        .await
        .register(unreachable_descriptor("compress-1", OperationType::Compress, dead_port));

    let (status, _, body) = send(
        &orchestrator,
        multipart_request("/compress", multipart_body(&[("a.pdf", b"%PDF")])),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "upstream_unreachable");
    assert!(body["message"].as_str().unwrap().starts_with("Service request failed:"));
}

#[tokio::test]
async fn test_no_service_fails_fast_regardless_of_timeout() {
    let mut config = config_for(&[]);
    config.request_timeout = Duration::from_secs(300);
    let orchestrator = Arc::new(Orchestrator::new(config).unwrap());

    let (status, _, body) = tokio::time::timeout(
        Duration::from_secs(1),
        send(&orchestrator, multipart_request("/merge", multipart_body(&[("a.pdf", b"%PDF")]))),
    )
    .await
    .expect("503 was not immediate");

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["error"], "no_healthy_service");
}

#[tokio::test]
async fn test_health_flip_and_rediscovery() {
    let worker = MockWorker::start("ocr-1", OperationType::Ocr).await;
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[&worker])).unwrap());
    orchestrator.discover_now().await;

    worker.set_healthy(false);
    orchestrator.check_health_now().await;
    {
        let registry = orchestrator.registry();
        let registry = registry.read().await;
        assert_eq!(registry.get("ocr-1").unwrap().status, ServiceStatus::Unhealthy);
    }

    let (status, _, _) = send(&orchestrator, multipart_request("/ocr", multipart_body(&[("a.pdf", b"%PDF")]))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // Discovery overwrites the whole record, including status.
    worker.set_healthy(true);
    orchestrator.discover_now().await;

    let (status, _, _) = send(&orchestrator, multipart_request("/ocr", multipart_body(&[("a.pdf", b"%PDF")]))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_background_loops_track_worker() {
    let worker = MockWorker::start("watermark-1", OperationType::Watermark).await;
    let mut config = config_for(&[&worker]);
    config.discovery_interval = Duration::from_secs(3600);
    config.health_check_interval = Duration::from_millis(100);
    let orchestrator = Arc::new(Orchestrator::new(config).unwrap());
    orchestrator.start();

    // First discovery pass runs immediately.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(orchestrator.select_service(OperationType::Watermark).await.is_ok());

    worker.set_healthy(false);
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(orchestrator.select_service(OperationType::Watermark).await.is_err());
    assert_eq!(orchestrator.registry().read().await.len(), 1);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_healthy_chosen_over_unhealthy_sibling() {
    let down = MockWorker::start("rotate-a", OperationType::Rotate).await;
    let up = MockWorker::start("rotate-b", OperationType::Rotate).await;
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[&down, &up])).unwrap());
    orchestrator.discover_now().await;

    down.set_healthy(false);
    orchestrator.check_health_now().await;

    for _ in 0..100 {
        let (status, _, _) = send(&orchestrator, multipart_request("/rotate", multipart_body(&[("a.pdf", b"%PDF")]))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let snapshot = orchestrator.metrics().snapshot();
    assert_eq!(snapshot.services.get("rotate-b").unwrap().request_count, 100);
    assert!(!snapshot.services.contains_key("rotate-a"));
    assert_eq!(snapshot.operations.get("rotate").unwrap().success_count, 100);
}

#[tokio::test]
async fn test_oversize_upload_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&[]);
    config.max_file_size_mb = 1;
    config.upload_dir = dir.path().to_path_buf();
    let orchestrator = Arc::new(Orchestrator::new(config).unwrap());

    let big = vec![0u8; 1024 * 1024 + 1];
    let (status, _, body) = send(&orchestrator, multipart_request("/upload", multipart_body(&[("big.pdf", &big)]))).await;

    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["message"], "File big.pdf too large. Max size: 1MB");
}

#[tokio::test]
async fn test_upload_larger_than_default_body_limit() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&[]);
    config.upload_dir = dir.path().to_path_buf();
    let orchestrator = Arc::new(Orchestrator::new(config).unwrap());

    let file = vec![7u8; 3 * 1024 * 1024];
    let (status, _, body) = send(&orchestrator, multipart_request("/upload", multipart_body(&[("scan.pdf", &file)]))).await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["message"], "Uploaded 1 files");
    assert_eq!(body["files"][0]["size_mb"], 3.0);
    assert_eq!(std::fs::read(dir.path().join("scan.pdf")).unwrap().len(), file.len());
}

#[tokio::test]
async fn test_download_file_name_with_space() {
    let worker = MockWorker::start("page_numbers-77", OperationType::PageNumbers).await;
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[&worker])).unwrap());
    orchestrator.discover_now().await;

    let (status, _, body) = send(
        &orchestrator,
        Request::builder()
            .uri("/download/page_numbers-77/my%20file.pdf")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(&body[..], b"file:my file.pdf");
}

#[tokio::test]
async fn test_stalled_binary_body_ends_at_request_timeout() {
    let worker = MockWorker::start("pdf_to_word-1", OperationType::PdfToWord).await;
    let mut config = config_for(&[&worker]);
    config.request_timeout = Duration::from_millis(300);
    let orchestrator = Arc::new(Orchestrator::new(config).unwrap());
    orchestrator.discover_now().await;

    let response = build_router(orchestrator.clone())
        .oneshot(json_request("/pdf-to-word", json!({"file_name": "a.pdf"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let read = tokio::time::timeout(
        Duration::from_secs(3),
        axum::body::to_bytes(response.into_body(), usize::MAX),
    )
    .await
    .expect("response body outlived the request timeout");
    assert!(read.is_err());
}

#[tokio::test]
async fn test_stalled_json_body_ends_at_request_timeout() {
    let worker = MockWorker::start("pdf_to_html-1", OperationType::PdfToHtml).await;
    let mut config = config_for(&[&worker]);
    config.request_timeout = Duration::from_millis(300);
    let orchestrator = Arc::new(Orchestrator::new(config).unwrap());
    orchestrator.discover_now().await;

    let started = std::time::Instant::now();
    let (status, _, body) = tokio::time::timeout(
        Duration::from_secs(3),
        send(&orchestrator, json_request("/pdf-to-html", json!({"file_name": "a.pdf"}))),
    )
    .await
    .expect("request outlived the request timeout");

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(String::from_utf8_lossy(&body).contains("timed out"));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_client_disconnect_cancels_worker_call() {
    let worker = MockWorker::start("pdf_to_excel-1", OperationType::PdfToExcel).await;
    let orchestrator = Arc::new(Orchestrator::new(config_for(&[&worker])).unwrap());
    orchestrator.discover_now().await;

    let call = tokio::spawn(
        build_router(orchestrator.clone()).oneshot(json_request("/pdf-to-excel", json!({"file_name": "a.xlsx"}))),
    );
    tokio::time::timeout(Duration::from_secs(2), worker.hold_started.notified())
        .await
        .expect("worker never received the forwarded call");
    assert_eq!(orchestrator.metrics().snapshot().active_requests, 1);

    call.abort();
    assert!(call.await.unwrap_err().is_cancelled());

    let mut released = false;
    for _ in 0..40 {
        if worker.hold_released.load(Ordering::SeqCst) {
            released = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(released, "worker connection stayed open after the client went away");
    assert_eq!(orchestrator.metrics().snapshot().active_requests, 0);
}
