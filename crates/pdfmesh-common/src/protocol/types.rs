//! Operation and status enumerations.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::PdfMeshError;

/// The closed set of PDF operations a worker can be bound to.
///
/// Serialized in `snake_case` (`"page_numbers"`, `"pdf_to_word"`), which is
/// also the form accepted by [`FromStr`] and used in `/services/{operation}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    Merge,
    Split,
    Rotate,
    Protect,
    Unlock,
    Compress,
    Watermark,
    PageNumbers,
    Crop,
    Repair,
    Ocr,
    PdfToImage,
    ImageToPdf,
    PdfToWord,
    WordToPdf,
    PdfToExcel,
    ExcelToPdf,
    PdfToHtml,
    HtmlToPdf,
    PdfToPowerpoint,
    PowerpointToPdf,
}

impl OperationType {
    /// Every operation type, in declaration order.
    pub const ALL: [OperationType; 21] = [
        OperationType::Merge,
        OperationType::Split,
        OperationType::Rotate,
        OperationType::Protect,
        OperationType::Unlock,
        OperationType::Compress,
        OperationType::Watermark,
        OperationType::PageNumbers,
        OperationType::Crop,
        OperationType::Repair,
        OperationType::Ocr,
        OperationType::PdfToImage,
        OperationType::ImageToPdf,
        OperationType::PdfToWord,
        OperationType::WordToPdf,
        OperationType::PdfToExcel,
        OperationType::ExcelToPdf,
        OperationType::PdfToHtml,
        OperationType::HtmlToPdf,
        OperationType::PdfToPowerpoint,
        OperationType::PowerpointToPdf,
    ];

    /// Wire name of the operation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Merge => "merge",
            OperationType::Split => "split",
            OperationType::Rotate => "rotate",
            OperationType::Protect => "protect",
            OperationType::Unlock => "unlock",
            OperationType::Compress => "compress",
            OperationType::Watermark => "watermark",
            OperationType::PageNumbers => "page_numbers",
            OperationType::Crop => "crop",
            OperationType::Repair => "repair",
            OperationType::Ocr => "ocr",
            OperationType::PdfToImage => "pdf_to_image",
            OperationType::ImageToPdf => "image_to_pdf",
            OperationType::PdfToWord => "pdf_to_word",
            OperationType::WordToPdf => "word_to_pdf",
            OperationType::PdfToExcel => "pdf_to_excel",
            OperationType::ExcelToPdf => "excel_to_pdf",
            OperationType::PdfToHtml => "pdf_to_html",
            OperationType::HtmlToPdf => "html_to_pdf",
            OperationType::PdfToPowerpoint => "pdf_to_powerpoint",
            OperationType::PowerpointToPdf => "powerpoint_to_pdf",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = PdfMeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OperationType::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| PdfMeshError::InvalidOperation(s.to_string()))
    }
}

/// Self-reported lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Starting,
    Healthy,
    Unhealthy,
    Stopping,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Starting => "starting",
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Unhealthy => "unhealthy",
            ServiceStatus::Stopping => "stopping",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceStatus::Healthy)
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
