//! HTTP Router for Orchestrator
//!
//! Builds the axum router for the orchestrator's client-facing surface:
//! introspection (`/`, `/health`, `/services`, `/metrics`), uploads, the
//! download relay and one `POST` route per proxied operation.

use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Request, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use pdfmesh_common::{OperationType, PdfMeshError, ServiceDescriptor};
use pdfmesh_metrics::MetricsSnapshot;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::SystemTime;

use crate::api_error::ApiError;
use crate::operations::OPERATION_ROUTES;
use crate::orchestrator::Orchestrator;
use crate::proxy;
use crate::upload::{self, UploadConfig};

pub const SERVICE_NAME: &str = "PDF Microservices Orchestrator";

/// Builds the orchestrator router with its state applied.
///
/// Operation routes take the raw request so multipart bodies are streamed to
/// the worker unchanged.
pub fn build_router(orchestrator: Arc<Orchestrator>) -> Router {
    let mut router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/services", get(list_services))
        .route("/services/:operation_type", get(services_by_operation))
        .route("/metrics", get(metrics))
        .route("/upload", post(upload).layer(DefaultBodyLimit::disable()))
        .route("/download/:service_id/:file_name", get(download));

    for route in OPERATION_ROUTES.iter() {
        router = router.route(
            route.path,
            post(move |State(orchestrator): State<Arc<Orchestrator>>, request: Request| {
                proxy::handle_operation(orchestrator, route, request)
            }),
        );
    }

    router.with_state(orchestrator)
}

async fn root(State(orchestrator): State<Arc<Orchestrator>>) -> Json<Value> {
    let registered = orchestrator.registry().read().await.len();
    let operations: Vec<&str> = OperationType::ALL.iter().map(|op| op.as_str()).collect();

    Json(json!({
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "available_operations": operations,
        "registered_services": registered,
    }))
}

async fn health(State(orchestrator): State<Arc<Orchestrator>>) -> Json<Value> {
    let (total, healthy) = {
        let registry = orchestrator.registry();
        let registry = registry.read().await;
        (registry.len(), registry.healthy_count())
    };
    let timestamp = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();

    Json(json!({
        "status": "healthy",
        "timestamp": timestamp,
        "services": {
            "total": total,
            "healthy": healthy,
            "unhealthy": total - healthy,
        },
    }))
}

async fn list_services(State(orchestrator): State<Arc<Orchestrator>>) -> Json<Vec<ServiceDescriptor>> {
    let services = orchestrator.registry().read().await.all();
    Json(services)
}

async fn services_by_operation(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path(operation_type): Path<String>,
) -> Result<Json<Vec<ServiceDescriptor>>, ApiError> {
    let operation: OperationType = operation_type.parse()?;

    let mut services = orchestrator.registry().read().await.list_by_operation(operation);
    services.sort_by(|a, b| a.service_id.cmp(&b.service_id));
    Ok(Json(services))
}

async fn metrics(State(orchestrator): State<Arc<Orchestrator>>) -> Json<MetricsSnapshot> {
    Json(orchestrator.metrics().snapshot())
}

async fn upload(
    State(orchestrator): State<Arc<Orchestrator>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let multipart = multipart.map_err(|rejection| PdfMeshError::InvalidRequest(rejection.body_text()))?;

    let config = UploadConfig {
        upload_dir: orchestrator.config().upload_dir.clone(),
        max_file_size_mb: orchestrator.config().max_file_size_mb,
    };
    let response = upload::save_uploads(multipart, &config).await?;
    Ok(Json(response).into_response())
}

async fn download(
    State(orchestrator): State<Arc<Orchestrator>>,
    Path((service_id, file_name)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    Ok(proxy::relay_download(&orchestrator, &service_id, &file_name).await?)
}
