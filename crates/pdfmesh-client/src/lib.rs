pub mod client;

pub use client::{OrchestratorClient, OrchestratorHealth, OrchestratorInfo, ServiceCounts};
