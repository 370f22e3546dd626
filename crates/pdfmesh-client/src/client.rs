use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use pdfmesh_common::{OperationType, PdfMeshError, Result, ServiceDescriptor};
use pdfmesh_metrics::MetricsSnapshot;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Response of the orchestrator's `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorInfo {
    pub service: String,
    pub version: String,
    pub status: String,
    pub available_operations: Vec<String>,
    pub registered_services: usize,
}

/// Response of the orchestrator's `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorHealth {
    pub status: String,
    pub timestamp: f64,
    pub services: ServiceCounts,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCounts {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
}

/// PDFMesh orchestrator client
///
/// Talks plain HTTP/1 to the orchestrator. Clones share the underlying
/// connection pool.
#[derive(Clone)]
pub struct OrchestratorClient {
    base_url: String,
    timeout: Duration,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl OrchestratorClient {
    /// Create a client for the orchestrator at `base_url` (e.g. `http://127.0.0.1:8000`).
    ///
    /// Only `http://` URLs are accepted; the connector has no TLS support.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into();
        if base_url.starts_with("https://") {
            return Err(PdfMeshError::InvalidRequest(format!(
                "TLS is not supported, use an http:// orchestrator URL instead of '{}'",
                base_url
            )));
        }
        if !base_url.starts_with("http://") {
            return Err(PdfMeshError::InvalidRequest(format!(
                "Orchestrator URL must start with http://, got '{}'",
                base_url
            )));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
            client: Client::builder(TokioExecutor::new()).build_http(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn info(&self) -> Result<OrchestratorInfo> {
        self.get_json("/").await
    }

    pub async fn health(&self) -> Result<OrchestratorHealth> {
        self.get_json("/health").await
    }

    /// All registered services, healthy or not.
    pub async fn services(&self) -> Result<Vec<ServiceDescriptor>> {
        self.get_json("/services").await
    }

    pub async fn services_for(&self, operation: OperationType) -> Result<Vec<ServiceDescriptor>> {
        self.get_json(&format!("/services/{}", operation)).await
    }

    pub async fn metrics(&self) -> Result<MetricsSnapshot> {
        self.get_json("/metrics").await
    }

    /// Posts a JSON body to an operation route such as `/crop` or `/unlock`.
    ///
    /// Worker and orchestrator errors come back as `PdfMeshError::Upstream`
    /// carrying the response status and body.
    pub async fn call_json(&self, path: &str, body: &Value) -> Result<Value> {
        let body = serde_json::to_vec(body)?;
        let request = Request::builder()
            .method(Method::POST)
            .uri(self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| PdfMeshError::Transport(format!("Failed to build request: {}", e)))?;

        let bytes = self.send(request).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(self.url(path))
            .body(Full::new(Bytes::new()))
            .map_err(|e| PdfMeshError::Transport(format!("Failed to build request: {}", e)))?;

        let bytes = self.send(request).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sends a request and reads the whole body; the timeout covers both.
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<Bytes> {
        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| PdfMeshError::Timeout(self.timeout.as_millis() as u64))?
    }

    async fn exchange(&self, request: Request<Full<Bytes>>) -> Result<Bytes> {
        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| PdfMeshError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| PdfMeshError::Transport(format!("Failed to read response: {}", e)))?
            .to_bytes();

        if status != StatusCode::OK {
            return Err(PdfMeshError::Upstream {
                status: status.as_u16(),
                content_type,
                body: bytes.to_vec(),
            });
        }
        Ok(bytes)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}
