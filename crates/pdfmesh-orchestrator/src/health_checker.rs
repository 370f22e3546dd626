use pdfmesh_common::{HealthReport, Result, ServiceDescriptor, ServiceStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::registry::ServiceRegistry;
use crate::worker_client::WorkerClient;

/// Outcome of probing one service, applied to the registry afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckUpdate {
    pub service_id: String,
    pub previous: ServiceStatus,
    pub status: ServiceStatus,
}

/// Health checker for registered services.
///
/// Every tick it probes `GET /health` on every registered service in
/// parallel and overwrites each status. Failures degrade to unhealthy; entries
/// are never removed here.
pub struct HealthChecker {
    registry: Arc<RwLock<ServiceRegistry>>,
    client: WorkerClient,
    interval: Duration,
    probe_timeout: Duration,
}

impl HealthChecker {
    /// Creates a new health checker.
    ///
    /// # Arguments
    /// * `registry` - The registry whose services are probed
    /// * `client` - Shared worker client
    /// * `config` - Supplies the check interval and probe timeout
    pub fn new(
        registry: Arc<RwLock<ServiceRegistry>>,
        client: WorkerClient,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            client,
            interval: config.health_check_interval,
            probe_timeout: config.probe_timeout,
        }
    }

    /// Starts the health checker task.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(token).await;
        })
    }

    /// Main health check loop
    async fn run(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Health checker stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.check_all_services().await;
                }
            }
        }
    }

    /// Checks every registered service once.
    ///
    /// # Returns
    /// The updates that were applied
    pub async fn check_all_services(&self) -> Vec<HealthCheckUpdate> {
        let services = {
            let registry = self.registry.read().await;
            registry.all()
        };

        // Check all services in parallel
        let checks = services.into_iter().map(|service| async move {
            let result = self.check_service_health(&service).await;
            Self::process_health_result(service, result)
        });
        let updates = futures::future::join_all(checks).await;

        let mut applied = Vec::with_capacity(updates.len());
        for update in updates {
            if self.apply_health_update(&update).await {
                applied.push(update);
            }
        }
        applied
    }

    /// Check a single service's health
    async fn check_service_health(&self, service: &ServiceDescriptor) -> Result<HealthReport> {
        self.client
            .get_json::<HealthReport>(&service.url("/health"), self.probe_timeout)
            .await
    }

    /// Turns a probe result into the status to store.
    fn process_health_result(service: ServiceDescriptor, result: Result<HealthReport>) -> HealthCheckUpdate {
        let status = match result {
            Ok(report) => report.status,
            Err(e) => {
                debug!("Health check for {} failed: {}", service.service_id, e);
                ServiceStatus::Unhealthy
            }
        };

        HealthCheckUpdate {
            service_id: service.service_id,
            previous: service.status,
            status,
        }
    }

    /// Applies an update; returns `false` if the service was unregistered
    /// while its probe was in flight.
    async fn apply_health_update(&self, update: &HealthCheckUpdate) -> bool {
        let mut registry = self.registry.write().await;
        if !registry.update_status(&update.service_id, update.status) {
            return false;
        }

        if update.previous != update.status {
            if update.status.is_healthy() {
                info!("Service {} is healthy again", update.service_id);
            } else {
                warn!(
                    "Service {} is now {} (was {})",
                    update.service_id, update.status, update.previous
                );
            }
        }
        true
    }
}
