//! Worker self-description types.
//!
//! These mirror the bodies a worker returns from `GET /info` and
//! `GET /health`. The orchestrator never constructs them for real workers; it
//! only parses what workers report.

use serde::{Deserialize, Serialize};

use super::types::{OperationType, ServiceStatus};

/// Worker-assigned identity, unique per running instance.
pub type ServiceId = String;

/// Descriptor of one running worker instance, as reported by `GET /info`.
///
/// # Fields
///
/// - `service_id`: identity assigned by the worker (name plus random suffix),
///   so a restarted worker shows up under a new identity
/// - `operation_type`: the single operation this worker serves
/// - `host`/`port`: where the worker can be reached
/// - `status`: the only field the health checker mutates after registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub service_id: ServiceId,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub operation_type: OperationType,
    pub host: String,
    pub port: u16,
    pub status: ServiceStatus,
    #[serde(default)]
    pub endpoints: Vec<String>,
}

impl ServiceDescriptor {
    /// `host:port` of the worker.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Absolute URL of `path` on this worker.
    ///
    /// `path` is expected to start with `/`.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.address(), path)
    }

    pub fn is_healthy(&self) -> bool {
        self.status.is_healthy()
    }
}

fn unhealthy() -> ServiceStatus {
    ServiceStatus::Unhealthy
}

/// Body of a worker's `GET /health` response.
///
/// Only `status` is interpreted. A body without a status field is read as
/// unhealthy; every other field is kept untyped so that workers disagreeing
/// on `timestamp` or `version` formats still parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    #[serde(default = "unhealthy")]
    pub status: ServiceStatus,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}
