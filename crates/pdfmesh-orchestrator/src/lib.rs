//! PDFMesh Orchestrator
//!
//! Routes client requests for PDF operations to independently running,
//! single-purpose worker services.
//!
//! # Components
//!
//! - [`ServiceRegistry`]: identity to last known [`pdfmesh_common::ServiceDescriptor`]
//! - [`DiscoveryLoop`]: polls known candidates' `/info` and registers them
//! - [`HealthChecker`]: polls `/health` of registered services
//! - [`Orchestrator`]: owns the registry, the loops and worker selection
//! - [`HttpServer`]: the client-facing axum surface and request proxy
//!
//! Requests flow client -> router -> registry lookup -> worker -> router ->
//! client. The discovery and health loops are the only writers of the
//! registry.

pub mod api_error;
pub mod config;
pub mod discovery;
pub mod health_checker;
pub mod http_router;
pub mod http_server;
pub mod operations;
pub mod orchestrator;
pub mod proxy;
pub mod registry;
pub mod selection;
pub mod upload;
pub mod worker_client;

pub use api_error::ApiError;
pub use config::{default_candidates, KnownCandidate, OrchestratorConfig, SelectionMode};
pub use discovery::DiscoveryLoop;
pub use health_checker::{HealthCheckUpdate, HealthChecker};
pub use http_router::build_router;
pub use http_server::HttpServer;
pub use operations::{route_for_path, OperationRoute, PayloadKind, OPERATION_ROUTES};
pub use orchestrator::Orchestrator;
pub use registry::ServiceRegistry;
pub use selection::{FirstHealthy, RoundRobin, SelectionPolicy};
pub use worker_client::WorkerClient;
