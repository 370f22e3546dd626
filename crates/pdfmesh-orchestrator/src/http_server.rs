//! HTTP Server for Orchestrator
//!
//! Serves the router from [`crate::http_router`] with CORS and request
//! tracing, and shuts down gracefully when its cancellation token fires.

use pdfmesh_common::{PdfMeshError, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::http_router::build_router;
use crate::orchestrator::Orchestrator;

/// HTTP server for the orchestrator.
pub struct HttpServer {
    orchestrator: Arc<Orchestrator>,
}

impl HttpServer {
    /// Creates a new HTTP server.
    ///
    /// # Arguments
    /// * `orchestrator` - Arc-wrapped orchestrator instance
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self { orchestrator }
    }

    /// The full application: routes plus CORS and tracing layers.
    pub fn app(&self) -> axum::Router {
        build_router(self.orchestrator.clone())
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Binds the configured host and port, then serves until `shutdown`.
    ///
    /// # Returns
    /// - `Ok(())` - Server drained in-flight requests and stopped
    /// - `Err(PdfMeshError::Transport)` - Bind or serve failed
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let (host, port) = {
            let config = self.orchestrator.config();
            (config.host.clone(), config.port)
        };

        let listener = TcpListener::bind((host.as_str(), port))
            .await
            .map_err(|e| PdfMeshError::Transport(format!("Failed to bind to {}:{}: {}", host, port, e)))?;

        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown`.
    pub async fn serve(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let app = self.app();

        info!(
            "Orchestrator HTTP server listening on {}",
            listener
                .local_addr()
                .map_err(|e| PdfMeshError::Transport(format!("Failed to get local addr: {}", e)))?
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .map_err(|e| PdfMeshError::Transport(format!("Server error: {}", e)))?;

        info!("Orchestrator HTTP server stopped");
        Ok(())
    }
}
