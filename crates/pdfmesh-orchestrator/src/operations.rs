//! Table of proxied operation endpoints.

use pdfmesh_common::OperationType;

/// Shape of the body a client sends to an operation endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// `multipart/form-data` with one file plus form fields
    SingleFile,
    /// `multipart/form-data` with several files
    MultipleFiles,
    /// A JSON object
    Json,
}

impl PayloadKind {
    pub fn is_multipart(&self) -> bool {
        matches!(self, PayloadKind::SingleFile | PayloadKind::MultipleFiles)
    }
}

/// One `POST` endpoint on the orchestrator and where it is forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationRoute {
    /// Orchestrator path
    pub path: &'static str,
    /// Operation type of the workers that serve it
    pub operation: OperationType,
    /// Path on the selected worker
    pub worker_endpoint: &'static str,
    pub payload: PayloadKind,
}

const fn route(
    path: &'static str,
    operation: OperationType,
    worker_endpoint: &'static str,
    payload: PayloadKind,
) -> OperationRoute {
    OperationRoute {
        path,
        operation,
        worker_endpoint,
        payload,
    }
}

use OperationType as Op;
use PayloadKind::{Json, MultipleFiles, SingleFile};

/// Every proxied operation endpoint. `/unlock` is served by protect workers.
pub static OPERATION_ROUTES: [OperationRoute; 21] = [
    route("/merge", Op::Merge, "/process", MultipleFiles),
    route("/rotate", Op::Rotate, "/process", SingleFile),
    route("/split", Op::Split, "/process", SingleFile),
    route("/protect", Op::Protect, "/process", SingleFile),
    route("/unlock", Op::Protect, "/unlock", Json),
    route("/compress", Op::Compress, "/process", SingleFile),
    route("/watermark", Op::Watermark, "/process", SingleFile),
    route("/page-numbers", Op::PageNumbers, "/page-numbers", Json),
    route("/crop", Op::Crop, "/crop", Json),
    route("/repair", Op::Repair, "/process", SingleFile),
    route("/ocr", Op::Ocr, "/process", SingleFile),
    route("/pdf-to-image", Op::PdfToImage, "/process", SingleFile),
    route("/image-to-pdf", Op::ImageToPdf, "/process", MultipleFiles),
    route("/pdf-to-word", Op::PdfToWord, "/pdf-to-word", Json),
    route("/word-to-pdf", Op::WordToPdf, "/word-to-pdf", Json),
    route("/pdf-to-excel", Op::PdfToExcel, "/pdf-to-excel", Json),
    route("/excel-to-pdf", Op::ExcelToPdf, "/excel-to-pdf", Json),
    route("/pdf-to-html", Op::PdfToHtml, "/pdf-to-html", Json),
    route("/html-to-pdf", Op::HtmlToPdf, "/html-to-pdf", Json),
    route("/pdf-to-powerpoint", Op::PdfToPowerpoint, "/pdf-to-powerpoint", Json),
    route("/powerpoint-to-pdf", Op::PowerpointToPdf, "/powerpoint-to-pdf", Json),
];

pub fn route_for_path(path: &str) -> Option<&'static OperationRoute> {
    OPERATION_ROUTES.iter().find(|route| route.path == path)
}

impl OperationRoute {
    /// Attachment name used when the worker sends no `Content-Disposition`.
    pub fn fallback_filename(&self, content_type: Option<&str>) -> String {
        let extension = content_type.map(extension_for).unwrap_or("bin");
        match self.payload {
            PayloadKind::MultipleFiles if self.operation == Op::Merge => format!("merged.{}", extension),
            _ => format!("processed_{}.{}", self.operation, extension),
        }
    }
}

fn extension_for(content_type: &str) -> &'static str {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "application/pdf" => "pdf",
        "application/zip" | "application/x-zip-compressed" => "zip",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "text/html" => "html",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        _ => "bin",
    }
}
