use pdfmesh_common::{OperationType, ServiceDescriptor};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::SelectionMode;

/// Picks one worker out of the registered candidates for an operation.
///
/// Implementations only ever return a healthy candidate; `None` means no
/// candidate is healthy.
pub trait SelectionPolicy: Send + Sync {
    fn select(
        &self,
        operation_type: OperationType,
        candidates: Vec<ServiceDescriptor>,
    ) -> Option<ServiceDescriptor>;
}

/// Healthy candidates ordered by service id.
fn healthy_sorted(candidates: Vec<ServiceDescriptor>) -> Vec<ServiceDescriptor> {
    let mut healthy: Vec<_> = candidates.into_iter().filter(|d| d.is_healthy()).collect();
    healthy.sort_by(|a, b| a.service_id.cmp(&b.service_id));
    healthy
}

/// Always returns the first healthy worker.
///
/// Registry order is unspecified, so "first" means the lowest service id.
#[derive(Debug, Default)]
pub struct FirstHealthy;

impl SelectionPolicy for FirstHealthy {
    fn select(
        &self,
        _operation_type: OperationType,
        candidates: Vec<ServiceDescriptor>,
    ) -> Option<ServiceDescriptor> {
        healthy_sorted(candidates).into_iter().next()
    }
}

/// Rotates through healthy workers, with a separate cursor per operation.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursors: Mutex<HashMap<OperationType, usize>>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SelectionPolicy for RoundRobin {
    fn select(
        &self,
        operation_type: OperationType,
        candidates: Vec<ServiceDescriptor>,
    ) -> Option<ServiceDescriptor> {
        let mut healthy = healthy_sorted(candidates);
        if healthy.is_empty() {
            return None;
        }

        let index = {
            let mut cursors = self.cursors.lock().unwrap_or_else(|e| e.into_inner());
            let cursor = cursors.entry(operation_type).or_insert(0);
            let index = *cursor % healthy.len();
            *cursor = cursor.wrapping_add(1);
            index
        };
        Some(healthy.swap_remove(index))
    }
}

/// Builds the policy for a configured mode.
pub fn policy_for(mode: SelectionMode) -> Box<dyn SelectionPolicy> {
    match mode {
        SelectionMode::FirstHealthy => Box::new(FirstHealthy),
        SelectionMode::RoundRobin => Box::new(RoundRobin::new()),
    }
}
