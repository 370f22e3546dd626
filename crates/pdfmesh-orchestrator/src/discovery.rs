use pdfmesh_common::{Result, ServiceDescriptor};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{KnownCandidate, OrchestratorConfig};
use crate::registry::ServiceRegistry;
use crate::worker_client::WorkerClient;

/// Periodically polls the known candidates' `/info` endpoints and upserts
/// what they report into the registry.
///
/// Discovery only adds or overwrites entries. Failed probes are skipped and
/// retried on the next cycle.
pub struct DiscoveryLoop {
    registry: Arc<RwLock<ServiceRegistry>>,
    client: WorkerClient,
    candidates: Vec<KnownCandidate>,
    interval: Duration,
    probe_timeout: Duration,
    stale_after: Option<Duration>,
}

impl DiscoveryLoop {
    /// Creates a discovery loop over the candidates in `config`.
    ///
    /// # Arguments
    /// * `registry` - Registry to upsert discovered workers into
    /// * `client` - Shared worker client
    /// * `config` - Supplies candidates, interval, probe timeout and stale TTL
    pub fn new(
        registry: Arc<RwLock<ServiceRegistry>>,
        client: WorkerClient,
        config: &OrchestratorConfig,
    ) -> Self {
        Self {
            registry,
            client,
            candidates: config.candidates.clone(),
            interval: config.discovery_interval,
            probe_timeout: config.probe_timeout,
            stale_after: config.stale_after,
        }
    }

    /// Starts the loop; the first pass runs immediately.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run(token).await;
        })
    }

    async fn run(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Discovery loop stopped");
                    break;
                }
                _ = interval.tick() => {
                    self.discover_all().await;
                }
            }
        }
    }

    /// Probes every candidate once, concurrently.
    ///
    /// # Returns
    /// Number of workers registered in this pass
    pub async fn discover_all(&self) -> usize {
        let probes = self.candidates.iter().map(|candidate| async move {
            let result = self.probe(candidate).await;
            (candidate, result)
        });
        let results = futures::future::join_all(probes).await;

        let mut registered = 0;
        for (candidate, result) in results {
            match result {
                Ok(descriptor) => {
                    if descriptor.operation_type != candidate.operation_type {
                        warn!(
                            "Worker {} at {}:{} reports operation {} but is configured as {}",
                            descriptor.service_id,
                            candidate.host,
                            candidate.port,
                            descriptor.operation_type,
                            candidate.operation_type
                        );
                    }

                    let service_id = descriptor.service_id.clone();
                    let previous = self.registry.write().await.register(descriptor);
                    if previous.is_none() {
                        info!("Registered service {} from {}", service_id, candidate);
                    }
                    registered += 1;
                }
                Err(e) => {
                    debug!("Discovery probe for {} failed: {}", candidate, e);
                }
            }
        }

        if let Some(ttl) = self.stale_after {
            let removed = self.registry.write().await.prune_stale(ttl);
            for service_id in removed {
                info!("Pruned stale service {}", service_id);
            }
        }

        registered
    }

    async fn probe(&self, candidate: &KnownCandidate) -> Result<ServiceDescriptor> {
        self.client
            .get_json::<ServiceDescriptor>(&candidate.info_url(), self.probe_timeout)
            .await
    }
}
