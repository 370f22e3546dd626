use axum::body::Body;
use axum::http::{HeaderValue, Response};
use hyper::body::Incoming;
use pdfmesh_common::{OperationType, PdfMeshError, Result, ServiceDescriptor};
use pdfmesh_metrics::MetricsRegistry;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::OrchestratorConfig;
use crate::discovery::DiscoveryLoop;
use crate::health_checker::{HealthCheckUpdate, HealthChecker};
use crate::registry::ServiceRegistry;
use crate::selection::{policy_for, SelectionPolicy};
use crate::worker_client::{Deadline, WorkerClient};

/// PDFMesh Orchestrator - registry, background loops and request forwarding.
///
/// The orchestrator sits between clients and the single-purpose worker
/// services. It never touches PDF content; its responsibilities are:
///
/// 1. **Discovery**: poll the known candidates' `/info` and register them
/// 2. **Health Checking**: poll `/health` of registered services and keep
///    their status current
/// 3. **Selection**: pick a healthy worker for the requested operation
/// 4. **Forwarding**: send the client's body to the worker unchanged
///
/// The registry is the only shared mutable state. The two loops write it;
/// request handling only reads it.
pub struct Orchestrator {
    registry: Arc<RwLock<ServiceRegistry>>,
    client: WorkerClient,
    selection: Box<dyn SelectionPolicy>,
    metrics: Arc<MetricsRegistry>,
    discovery: Arc<DiscoveryLoop>,
    health_checker: Arc<HealthChecker>,
    config: OrchestratorConfig,
    shutdown: CancellationToken,
    /// Background loop handles, drained on shutdown
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Creates an orchestrator with an empty registry.
    ///
    /// No background work starts until [`Orchestrator::start`] is called.
    /// Fails with `PdfMeshError::Config` if the configuration is invalid,
    /// e.g. a zero discovery or health check interval.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;

        let registry = Arc::new(RwLock::new(ServiceRegistry::new()));
        let client = WorkerClient::new();

        let discovery = Arc::new(DiscoveryLoop::new(registry.clone(), client.clone(), &config));
        let health_checker = Arc::new(HealthChecker::new(registry.clone(), client.clone(), &config));

        Ok(Self {
            registry,
            client,
            selection: policy_for(config.selection),
            metrics: Arc::new(MetricsRegistry::new()),
            discovery,
            health_checker,
            config,
            shutdown: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Spawns the discovery and health loops.
    ///
    /// Each loop gets a child of the orchestrator's cancellation token.
    pub fn start(&self) {
        let discovery = self.discovery.clone().spawn(self.shutdown.child_token());
        let health = self.health_checker.clone().spawn(self.shutdown.child_token());

        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.push(discovery);
        tasks.push(health);

        info!(
            "Orchestrator started: {} candidates, discovery every {:?}, health checks every {:?}",
            self.config.candidates.len(),
            self.config.discovery_interval,
            self.config.health_check_interval
        );
    }

    /// Cancels the background loops and waits for them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();

        let tasks: Vec<_> = {
            let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
            tasks.drain(..).collect()
        };
        for task in tasks {
            if let Err(e) = task.await {
                debug!("Background task ended abnormally: {}", e);
            }
        }
        info!("Orchestrator stopped");
    }

    /// Runs one discovery pass now.
    pub async fn discover_now(&self) -> usize {
        self.discovery.discover_all().await
    }

    /// Runs one health check pass now.
    pub async fn check_health_now(&self) -> Vec<HealthCheckUpdate> {
        self.health_checker.check_all_services().await
    }

    pub fn registry(&self) -> Arc<RwLock<ServiceRegistry>> {
        self.registry.clone()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn client(&self) -> &WorkerClient {
        &self.client
    }

    /// Base URL used in rewritten download links.
    pub fn public_url(&self) -> String {
        self.config.public_url()
    }

    /// Picks a healthy worker for `operation`.
    ///
    /// # Errors
    /// `NoHealthyService` immediately when none is registered and healthy.
    pub async fn select_service(&self, operation: OperationType) -> Result<ServiceDescriptor> {
        let candidates = {
            let registry = self.registry.read().await;
            registry.list_by_operation(operation)
        };

        self.selection
            .select(operation, candidates)
            .ok_or(PdfMeshError::NoHealthyService(operation))
    }

    /// Looks up a registered service by identity, healthy or not.
    pub async fn service(&self, service_id: &str) -> Result<ServiceDescriptor> {
        let registry = self.registry.read().await;
        registry
            .get(service_id)
            .cloned()
            .ok_or_else(|| PdfMeshError::NotFound(format!("Service {} not found", service_id)))
    }

    /// Starts the time budget for one proxied call.
    pub fn deadline(&self) -> Deadline {
        Deadline::after(self.config.request_timeout)
    }

    /// Forwards a body to `endpoint` on `service` and returns the worker's
    /// response once its headers arrive. The caller bounds the body with the
    /// same `deadline`.
    pub async fn forward(
        &self,
        service: &ServiceDescriptor,
        endpoint: &str,
        content_type: Option<HeaderValue>,
        body: Body,
        deadline: Deadline,
    ) -> Result<Response<Incoming>> {
        self.metrics.record_service_request(&service.service_id);

        let url = service.url(endpoint);
        debug!("Forwarding to {} ({})", url, service.service_id);
        self.client.post(&url, content_type, body, deadline).await
    }

    /// Fetches `/download/{file_name}` from `service`.
    ///
    /// `file_name` is a single decoded path segment; it is percent-encoded
    /// before it goes on the wire.
    pub async fn download(
        &self,
        service: &ServiceDescriptor,
        file_name: &str,
        deadline: Deadline,
    ) -> Result<Response<Incoming>> {
        if matches!(file_name, "" | "." | "..") || file_name.contains(['/', '\\']) {
            return Err(PdfMeshError::InvalidRequest(format!("Invalid file name '{}'", file_name)));
        }
        self.metrics.record_service_request(&service.service_id);

        let url = service.url(&format!("/download/{}", urlencoding::encode(file_name)));
        self.client.get(&url, deadline).await
    }
}
