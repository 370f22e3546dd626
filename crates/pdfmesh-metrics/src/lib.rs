//! PDFMesh Metrics Collection
//!
//! Thread-safe request metrics for the PDFMesh orchestrator. Every proxied
//! request is recorded against the operation it targeted and the worker that
//! served it, so operators can see how traffic is spread over workers.
//!
//! # Architecture
//!
//! - [`MetricsRegistry`]: lock-free counters plus per-operation and
//!   per-service tables
//! - [`MetricsSnapshot`]: serializable point-in-time view served by
//!   `GET /metrics`
//!
//! # Usage Example
//!
//! ```rust
//! use pdfmesh_metrics::MetricsRegistry;
//! use std::time::Instant;
//!
//! let metrics = MetricsRegistry::new();
//!
//! let start = Instant::now();
//! // ... proxy the request ...
//! metrics.record_service_request("merge-1a2b3c4d");
//! metrics.record_call("merge", start, true);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.total_requests, 1);
//! ```

mod registry;
mod snapshot;

pub use registry::MetricsRegistry;
pub use snapshot::{MetricsSnapshot, OperationMetrics, ServerInfo, ServiceMetrics};
