use thiserror::Error;

use super::types::OperationType;

#[derive(Error, Debug)]
pub enum PdfMeshError {
    #[error("Invalid operation type: {0}")]
    InvalidOperation(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("File {file_name} too large. Max size: {max_mb}MB")]
    PayloadTooLarge { file_name: String, max_mb: u64 },

    #[error("No healthy services available for operation: {0}")]
    NoHealthyService(OperationType),

    /// Worker answered with a non-success status; relayed verbatim.
    #[error("Worker returned status {status}")]
    Upstream {
        status: u16,
        content_type: Option<String>,
        body: Vec<u8>,
    },

    #[error("Service request failed: {0}")]
    UpstreamUnreachable(String),

    #[error("Service request timed out after {0}ms")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PdfMeshError {
    /// HTTP status code a client should see for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            PdfMeshError::InvalidOperation(_) | PdfMeshError::InvalidRequest(_) => 400,
            PdfMeshError::NotFound(_) => 404,
            PdfMeshError::PayloadTooLarge { .. } => 413,
            PdfMeshError::NoHealthyService(_) => 503,
            PdfMeshError::Upstream { status, .. } => *status,
            PdfMeshError::UpstreamUnreachable(_)
            | PdfMeshError::Timeout(_)
            | PdfMeshError::InvalidResponse(_)
            | PdfMeshError::Transport(_)
            | PdfMeshError::Config(_)
            | PdfMeshError::JsonSerialization(_)
            | PdfMeshError::Io(_) => 500,
        }
    }

    /// Stable machine-readable code used in error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PdfMeshError::InvalidOperation(_) => "invalid_operation",
            PdfMeshError::InvalidRequest(_) => "invalid_request",
            PdfMeshError::NotFound(_) => "not_found",
            PdfMeshError::PayloadTooLarge { .. } => "payload_too_large",
            PdfMeshError::NoHealthyService(_) => "no_healthy_service",
            PdfMeshError::Upstream { .. } => "upstream_error",
            PdfMeshError::UpstreamUnreachable(_) => "upstream_unreachable",
            PdfMeshError::Timeout(_) => "upstream_timeout",
            PdfMeshError::InvalidResponse(_) => "invalid_response",
            PdfMeshError::Transport(_) => "transport_error",
            PdfMeshError::Config(_) => "config_error",
            PdfMeshError::JsonSerialization(_) => "serialization_error",
            PdfMeshError::Io(_) => "io_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, PdfMeshError>;
