//! Request proxying between clients and workers.
//!
//! A proxied call runs `received -> service_selected -> forwarding ->
//! relaying_response | reporting_error`. There is no retry and no failover to
//! a second worker.

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hyper::body::Incoming;
use pdfmesh_common::{PdfMeshError, Result, ServiceDescriptor};
use pdfmesh_metrics::MetricsRegistry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

use crate::api_error::ApiError;
use crate::operations::{OperationRoute, PayloadKind};
use crate::orchestrator::Orchestrator;
use crate::worker_client::Deadline;

/// Largest JSON body read from a client or a worker.
const JSON_BODY_LIMIT: usize = 16 * 1024 * 1024;
/// Largest error body buffered from a worker before relaying it.
const ERROR_BODY_LIMIT: usize = 4 * 1024 * 1024;

/// Keeps the active request gauge up while a proxied call is in flight,
/// including when the client disconnects and the handler is dropped.
struct ActiveRequest<'a>(&'a MetricsRegistry);

impl<'a> ActiveRequest<'a> {
    fn new(metrics: &'a MetricsRegistry) -> Self {
        metrics.request_started();
        Self(metrics)
    }
}

impl Drop for ActiveRequest<'_> {
    fn drop(&mut self) {
        self.0.request_finished();
    }
}

/// Axum entry point for one operation route.
pub async fn handle_operation(
    orchestrator: Arc<Orchestrator>,
    route: &'static OperationRoute,
    request: Request,
) -> Response {
    let start = Instant::now();
    let _active = ActiveRequest::new(orchestrator.metrics());

    let result = proxy_operation(&orchestrator, route, request).await;
    orchestrator
        .metrics()
        .record_call(route.operation.as_str(), start, result.is_ok());

    match result {
        Ok(response) => response,
        Err(e) => ApiError(e).into_response(),
    }
}

/// Validates the payload, selects a worker, forwards and relays.
pub async fn proxy_operation(
    orchestrator: &Orchestrator,
    route: &OperationRoute,
    request: Request,
) -> Result<Response> {
    let content_type = request.headers().get(header::CONTENT_TYPE).cloned();

    if route.payload.is_multipart() && !is_multipart(content_type.as_ref()) {
        return Err(PdfMeshError::InvalidRequest(format!(
            "{} expects a multipart/form-data upload",
            route.path
        )));
    }

    let (content_type, body) = match route.payload {
        PayloadKind::Json => {
            let bytes = read_json_object(request.into_body()).await?;
            let content_type =
                content_type.unwrap_or_else(|| HeaderValue::from_static("application/json"));
            (Some(content_type), Body::from(bytes))
        }
        PayloadKind::SingleFile | PayloadKind::MultipleFiles => (content_type, request.into_body()),
    };

    let service = orchestrator.select_service(route.operation).await?;
    let deadline = orchestrator.deadline();
    let response = orchestrator
        .forward(&service, route.worker_endpoint, content_type, body, deadline)
        .await?;

    relay_response(orchestrator, &service, route, response, deadline).await
}

/// Buffers a client body and checks it is a JSON object.
async fn read_json_object(body: Body) -> Result<Bytes> {
    let bytes = axum::body::to_bytes(body, JSON_BODY_LIMIT)
        .await
        .map_err(|e| PdfMeshError::InvalidRequest(format!("Failed to read request body: {}", e)))?;

    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| PdfMeshError::InvalidRequest(format!("Invalid JSON body: {}", e)))?;
    if !value.is_object() {
        return Err(PdfMeshError::InvalidRequest("Expected a JSON object body".to_string()));
    }
    Ok(bytes)
}

/// Turns a worker response into the client response.
///
/// - non-200: relayed with the worker's status, body and content type
/// - 200 JSON: `file_url` rewritten to point back through the orchestrator
/// - 200 anything else: streamed as an attachment
///
/// Body reads and streaming stop at `deadline`, the one started before the
/// request was forwarded.
pub async fn relay_response(
    orchestrator: &Orchestrator,
    service: &ServiceDescriptor,
    route: &OperationRoute,
    response: hyper::Response<Incoming>,
    deadline: Deadline,
) -> Result<Response> {
    let status = response.status();
    let content_type = header_string(response.headers(), header::CONTENT_TYPE);

    if status != StatusCode::OK {
        let body = read_worker_body(response.into_body(), ERROR_BODY_LIMIT, deadline).await?;
        warn!(
            "Service {} answered {} with status {}",
            service.service_id, route.path, status
        );
        return Err(PdfMeshError::Upstream {
            status: status.as_u16(),
            content_type,
            body: body.to_vec(),
        });
    }

    if content_type.as_deref().is_some_and(is_json) {
        let bytes = read_worker_body(response.into_body(), JSON_BODY_LIMIT, deadline).await?;
        let mut value: Value = serde_json::from_slice(&bytes).map_err(|e| {
            PdfMeshError::InvalidResponse(format!(
                "Service {} returned malformed JSON: {}",
                service.service_id, e
            ))
        })?;
        rewrite_file_url(&mut value, &orchestrator.public_url(), &service.service_id);
        return Ok(Json(value).into_response());
    }

    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .cloned()
        .unwrap_or_else(|| attachment(&route.fallback_filename(content_type.as_deref())));
    stream_response(response, disposition, deadline)
}

/// Streams `GET /download/{file_name}` from a registered worker.
///
/// The worker does not need to be healthy; any status it returns is relayed.
pub async fn relay_download(
    orchestrator: &Orchestrator,
    service_id: &str,
    file_name: &str,
) -> Result<Response> {
    let service = orchestrator.service(service_id).await?;
    let deadline = orchestrator.deadline();
    let response = orchestrator.download(&service, file_name, deadline).await?;

    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .cloned()
        .unwrap_or_else(|| attachment(file_name));
    stream_response(response, disposition, deadline)
}

/// Re-wraps a worker response without buffering its body. The body errors
/// out if it is still streaming at `deadline`.
fn stream_response(
    response: hyper::Response<Incoming>,
    disposition: HeaderValue,
    deadline: Deadline,
) -> Result<Response> {
    let status = response.status();
    let headers = response.headers();

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));

    let mut builder = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, content_type)
        .header(header::CONTENT_DISPOSITION, disposition);
    if let Some(length) = headers.get(header::CONTENT_LENGTH) {
        builder = builder.header(header::CONTENT_LENGTH, length.clone());
    }

    builder
        .body(deadline.bound_body(Body::new(response.into_body())))
        .map_err(|e| PdfMeshError::Transport(format!("Failed to build response: {}", e)))
}

async fn read_worker_body(body: Incoming, limit: usize, deadline: Deadline) -> Result<Bytes> {
    deadline
        .run(async {
            axum::body::to_bytes(Body::new(body), limit)
                .await
                .map_err(|e| PdfMeshError::Transport(format!("Failed to read worker response: {}", e)))
        })
        .await
}

/// Points a worker's `file_url` at the orchestrator's download relay.
///
/// `/download/x.pdf` on worker `rotate-1` becomes
/// `{public_url}/download/rotate-1/x.pdf`. The file name is the last path
/// segment, without query or fragment, percent-encoded exactly once. Returns
/// the new URL, or `None` if there was no non-empty `file_url`.
pub fn rewrite_file_url(value: &mut Value, public_url: &str, service_id: &str) -> Option<String> {
    let file_name = {
        let file_url = value.get("file_url")?.as_str()?;
        if file_url.is_empty() {
            return None;
        }
        let path = file_url.split(['?', '#']).next().unwrap_or(file_url);
        let segment = path.rsplit('/').next().unwrap_or(path);
        let decoded = urlencoding::decode(segment).map(|s| s.into_owned()).unwrap_or_else(|_| segment.to_string());
        urlencoding::encode(&decoded).into_owned()
    };

    let rewritten = format!(
        "{}/download/{}/{}",
        public_url,
        urlencoding::encode(service_id),
        file_name
    );
    value["file_url"] = Value::String(rewritten.clone());
    Some(rewritten)
}

fn attachment(file_name: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("attachment; filename=\"{}\"", file_name.replace('"', "")))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

fn mime_of(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

fn is_json(content_type: &str) -> bool {
    let mime = mime_of(content_type);
    mime == "application/json" || mime.ends_with("+json")
}

fn is_multipart(content_type: Option<&HeaderValue>) -> bool {
    content_type
        .and_then(|value| value.to_str().ok())
        .is_some_and(|ct| mime_of(ct) == "multipart/form-data")
}
