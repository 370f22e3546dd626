//! PDFMesh Response Types
//!
//! Structured bodies exchanged between clients, the orchestrator and workers.

use serde::{Deserialize, Serialize};

/// Structured result of a worker operation.
///
/// Workers answering JSON-style operation endpoints return this shape. When
/// `file_url` is set it points at the worker's own `/download/{file}` route;
/// the orchestrator rewrites it before relaying.
///
/// # Example
///
/// ```
/// use pdfmesh_common::ProcessingResponse;
///
/// let response = ProcessingResponse::success("Rotated 3 pages")
///     .with_file_url("/download/rotated.pdf");
/// assert!(response.success);
/// assert_eq!(response.file_url.as_deref(), Some("/download/rotated.pdf"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    pub message: String,
    #[serde(default)]
    pub file_url: Option<String>,
    #[serde(default)]
    pub file_size_mb: Option<f64>,
    #[serde(default)]
    pub processing_time_ms: Option<f64>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub error_details: Option<String>,
}

impl ProcessingResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            operation_id: None,
            message: message.into(),
            file_url: None,
            file_size_mb: None,
            processing_time_ms: None,
            metadata: None,
            error_details: None,
        }
    }

    pub fn with_file_url(mut self, url: impl Into<String>) -> Self {
        self.file_url = Some(url.into());
        self
    }
}

/// One file accepted by the orchestrator's `POST /upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedFile {
    pub filename: String,
    pub size_mb: f64,
    pub path: String,
}

/// Body of the orchestrator's `POST /upload` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub files: Vec<UploadedFile>,
}

impl UploadResponse {
    pub fn new(files: Vec<UploadedFile>) -> Self {
        Self {
            success: true,
            message: format!("Uploaded {} files", files.len()),
            files,
        }
    }
}

/// JSON body of every client-facing orchestrator error.
///
/// `status` repeats the HTTP status code and `error` is a stable machine
/// readable code (`no_healthy_service`, `payload_too_large`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub status: u16,
    pub error: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(status: u16, error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            status,
            error: error.into(),
            message: message.into(),
        }
    }
}
