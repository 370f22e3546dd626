use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use pdfmesh_common::{ErrorResponse, PdfMeshError};
use tracing::error;

/// Converts [`PdfMeshError`] into the client-facing JSON error body.
///
/// Non-success worker responses (`PdfMeshError::Upstream`) are the exception:
/// their status, body and content type are relayed as the worker sent them.
#[derive(Debug)]
pub struct ApiError(pub PdfMeshError);

impl From<PdfMeshError> for ApiError {
    fn from(err: PdfMeshError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if let PdfMeshError::Upstream { content_type, body, .. } = self.0 {
            let mut response = (status, body).into_response();
            if let Some(value) = content_type.and_then(|ct| HeaderValue::from_str(&ct).ok()) {
                response.headers_mut().insert(header::CONTENT_TYPE, value);
            }
            return response;
        }

        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }

        let body = ErrorResponse::new(status.as_u16(), self.0.code(), self.0.to_string());
        (status, Json(body)).into_response()
    }
}
