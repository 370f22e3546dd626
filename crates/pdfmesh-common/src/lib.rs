//! PDFMesh Common Types
//!
//! This crate provides the protocol definitions shared by the PDFMesh
//! orchestrator, its client and the worker services it routes to.
//!
//! # Overview
//!
//! PDFMesh runs every PDF operation (merge, rotate, OCR, conversions, ...) as
//! an independent HTTP worker bound to one operation type. The orchestrator
//! discovers those workers, tracks their health and proxies client requests
//! to them. This crate contains the vocabulary both sides agree on:
//!
//! - **Operation types**: the closed set of operations a worker can serve
//! - **Service descriptors**: what a worker reports from `GET /info`
//! - **Health reports**: what a worker reports from `GET /health`
//! - **Responses**: structured processing, upload and error bodies
//! - **Errors**: the [`PdfMeshError`] taxonomy used across crates
//!
//! # Example
//!
//! ```
//! use pdfmesh_common::{OperationType, ServiceStatus};
//!
//! let op: OperationType = "pdf_to_image".parse().unwrap();
//! assert_eq!(op, OperationType::PdfToImage);
//! assert_eq!(ServiceStatus::Healthy.as_str(), "healthy");
//! ```

pub mod protocol;

pub use protocol::*;
