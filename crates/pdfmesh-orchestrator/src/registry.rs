use pdfmesh_common::{OperationType, ServiceDescriptor, ServiceId, ServiceStatus};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// A registered descriptor plus when discovery last saw it.
#[derive(Debug, Clone)]
struct RegistryEntry {
    descriptor: ServiceDescriptor,
    last_seen: Instant,
}

/// In-memory map of worker identity to last known descriptor.
///
/// Pure data structure with no I/O. The orchestrator shares it as
/// `Arc<tokio::sync::RwLock<ServiceRegistry>>`: the discovery and health
/// loops write, the router only reads. Because every mutation happens under
/// the write lock, readers never see a half-written descriptor.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    services: HashMap<ServiceId, RegistryEntry>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or fully replaces the descriptor with the same identity.
    ///
    /// Nothing of the previous record is kept. Returns the replaced
    /// descriptor, if any.
    pub fn register(&mut self, descriptor: ServiceDescriptor) -> Option<ServiceDescriptor> {
        let entry = RegistryEntry {
            descriptor,
            last_seen: Instant::now(),
        };
        self.services
            .insert(entry.descriptor.service_id.clone(), entry)
            .map(|previous| previous.descriptor)
    }

    /// Removes an identity; a no-op if it is not registered.
    pub fn unregister(&mut self, service_id: &str) -> Option<ServiceDescriptor> {
        self.services.remove(service_id).map(|entry| entry.descriptor)
    }

    pub fn get(&self, service_id: &str) -> Option<&ServiceDescriptor> {
        self.services.get(service_id).map(|entry| &entry.descriptor)
    }

    /// All descriptors serving `operation_type`, in no particular order.
    pub fn list_by_operation(&self, operation_type: OperationType) -> Vec<ServiceDescriptor> {
        self.services
            .values()
            .filter(|entry| entry.descriptor.operation_type == operation_type)
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    /// All descriptors whose status is healthy.
    pub fn list_healthy(&self) -> Vec<ServiceDescriptor> {
        self.services
            .values()
            .filter(|entry| entry.descriptor.is_healthy())
            .map(|entry| entry.descriptor.clone())
            .collect()
    }

    /// Overwrites only the status of an existing entry.
    ///
    /// Returns `false` without inserting anything when the identity is not
    /// registered.
    pub fn update_status(&mut self, service_id: &str, status: ServiceStatus) -> bool {
        match self.services.get_mut(service_id) {
            Some(entry) => {
                entry.descriptor.status = status;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Snapshot of every descriptor, ordered by identity.
    pub fn all(&self) -> Vec<ServiceDescriptor> {
        let mut all: Vec<_> = self
            .services
            .values()
            .map(|entry| entry.descriptor.clone())
            .collect();
        all.sort_by(|a, b| a.service_id.cmp(&b.service_id));
        all
    }

    pub fn healthy_count(&self) -> usize {
        self.services
            .values()
            .filter(|entry| entry.descriptor.is_healthy())
            .count()
    }

    /// Removes entries that are not healthy and have not been re-registered
    /// by discovery within `ttl`. Returns the removed identities.
    pub fn prune_stale(&mut self, ttl: Duration) -> Vec<ServiceId> {
        let stale: Vec<ServiceId> = self
            .services
            .iter()
            .filter(|(_, entry)| !entry.descriptor.is_healthy() && entry.last_seen.elapsed() > ttl)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            self.services.remove(id);
        }
        stale
    }
}
