//! Orchestrator configuration.
//!
//! Values come from three layers, highest priority first: CLI flags (applied
//! by the binary), `PDFMESH_*` environment variables, then [`Default`].

use pdfmesh_common::{OperationType, PdfMeshError, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// A `(operation_type, host, port)` triple polled by the discovery loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownCandidate {
    pub operation_type: OperationType,
    pub host: String,
    pub port: u16,
}

impl KnownCandidate {
    pub fn new(operation_type: OperationType, host: impl Into<String>, port: u16) -> Self {
        Self {
            operation_type,
            host: host.into(),
            port,
        }
    }

    pub fn info_url(&self) -> String {
        format!("http://{}:{}/info", self.host, self.port)
    }
}

impl fmt::Display for KnownCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}:{}", self.operation_type, self.host, self.port)
    }
}

/// Parses `op=host:port`, e.g. `merge=localhost:8001`.
impl FromStr for KnownCandidate {
    type Err = PdfMeshError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || PdfMeshError::Config(format!("Invalid candidate '{}', expected op=host:port", s));

        let (op, addr) = s.split_once('=').ok_or_else(invalid)?;
        let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        let operation_type = op
            .trim()
            .parse::<OperationType>()
            .map_err(|e| PdfMeshError::Config(format!("Invalid candidate '{}': {}", s, e)))?;

        Ok(Self::new(operation_type, host, port))
    }
}

/// The standard worker port table: one worker per operation on localhost,
/// ports 8001 to 8020. `unlock` is hosted by the protect worker.
pub fn default_candidates() -> Vec<KnownCandidate> {
    use OperationType::*;

    [
        (Merge, 8001),
        (Rotate, 8002),
        (Split, 8003),
        (Protect, 8004),
        (Compress, 8005),
        (Watermark, 8006),
        (PageNumbers, 8007),
        (Crop, 8008),
        (Repair, 8009),
        (Ocr, 8010),
        (PdfToImage, 8011),
        (ImageToPdf, 8012),
        (PdfToWord, 8013),
        (WordToPdf, 8014),
        (PdfToExcel, 8015),
        (ExcelToPdf, 8016),
        (PdfToHtml, 8017),
        (HtmlToPdf, 8018),
        (PdfToPowerpoint, 8019),
        (PowerpointToPdf, 8020),
    ]
    .into_iter()
    .map(|(op, port)| KnownCandidate::new(op, "localhost", port))
    .collect()
}

/// How the router picks among several healthy workers of one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionMode {
    /// Always the healthy worker with the lowest service id.
    #[default]
    FirstHealthy,
    /// Rotate through healthy workers per operation.
    RoundRobin,
}

impl FromStr for SelectionMode {
    type Err = PdfMeshError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "first-healthy" => Ok(SelectionMode::FirstHealthy),
            "round-robin" => Ok(SelectionMode::RoundRobin),
            other => Err(PdfMeshError::Config(format!(
                "Unknown selection policy '{}', expected first-healthy or round-robin",
                other
            ))),
        }
    }
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Host the HTTP surface binds to
    pub host: String,
    /// Port the HTTP surface binds to
    pub port: u16,
    /// Base URL clients use to reach the orchestrator; rewritten download
    /// links point here. Defaults to `http://{host}:{port}`.
    pub public_url: Option<String>,
    pub discovery_interval: Duration,
    pub health_check_interval: Duration,
    /// Bound on each `/info` and `/health` probe
    pub probe_timeout: Duration,
    /// Bound on each proxied worker call
    pub request_timeout: Duration,
    /// Per-file limit for `POST /upload`
    pub max_file_size_mb: u64,
    pub upload_dir: PathBuf,
    pub candidates: Vec<KnownCandidate>,
    pub selection: SelectionMode,
    /// When set, entries that are not healthy and have not been seen by
    /// discovery for this long are pruned. Off by default.
    pub stale_after: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8000,
            public_url: None,
            discovery_interval: Duration::from_secs(30),
            health_check_interval: Duration::from_secs(10),
            probe_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(300),
            max_file_size_mb: 100,
            upload_dir: PathBuf::from("temp/orchestrator"),
            candidates: default_candidates(),
            selection: SelectionMode::FirstHealthy,
            stale_after: None,
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_lookup(|key| std::env::var(key).ok())
    }

    /// Overlays `PDFMESH_*` variables resolved through `lookup`.
    pub fn with_env_lookup<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PDFMESH_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PDFMESH_PORT") {
            self.port = parse_env("PDFMESH_PORT", &port)?;
        }
        if let Some(url) = lookup("PDFMESH_PUBLIC_URL") {
            self.public_url = Some(url);
        }
        if let Some(secs) = lookup("PDFMESH_DISCOVERY_INTERVAL") {
            self.discovery_interval = Duration::from_secs(parse_env("PDFMESH_DISCOVERY_INTERVAL", &secs)?);
        }
        if let Some(secs) = lookup("PDFMESH_HEALTH_INTERVAL") {
            self.health_check_interval = Duration::from_secs(parse_env("PDFMESH_HEALTH_INTERVAL", &secs)?);
        }
        if let Some(secs) = lookup("PDFMESH_REQUEST_TIMEOUT") {
            self.request_timeout = Duration::from_secs(parse_env("PDFMESH_REQUEST_TIMEOUT", &secs)?);
        }
        if let Some(mb) = lookup("PDFMESH_MAX_FILE_SIZE_MB") {
            self.max_file_size_mb = parse_env("PDFMESH_MAX_FILE_SIZE_MB", &mb)?;
        }
        if let Some(dir) = lookup("PDFMESH_UPLOAD_DIR") {
            self.upload_dir = PathBuf::from(dir);
        }
        Ok(self)
    }

    /// Rejects settings the loops and the proxy cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.discovery_interval.is_zero() {
            return Err(PdfMeshError::Config("discovery interval must be positive".into()));
        }
        if self.health_check_interval.is_zero() {
            return Err(PdfMeshError::Config("health check interval must be positive".into()));
        }
        if self.probe_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(PdfMeshError::Config("timeouts must be positive".into()));
        }
        if let Some(url) = &self.public_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(PdfMeshError::Config(format!(
                    "public URL '{}' must start with http:// or https://",
                    url
                )));
            }
        }
        Ok(())
    }

    /// Base URL used when rewriting worker download links, without a
    /// trailing slash.
    pub fn public_url(&self) -> String {
        let url = self
            .public_url
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.host, self.port));
        url.trim_end_matches('/').to_string()
    }

    /// Per-file upload limit in bytes.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PdfMeshError::Config(format!("Invalid value for {}: '{}'", key, value)))
}
