//! # PDFMesh CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Start the orchestrator with the standard worker port table
//! pdfmesh orchestrator --host 0.0.0.0 --port 8000
//!
//! # Only poll two workers, balancing across them
//! pdfmesh orchestrator -c merge=10.0.0.5:8001 -c merge=10.0.0.6:8001 --selection round-robin
//!
//! # Inspect a running orchestrator
//! pdfmesh services http://127.0.0.1:8000
//! pdfmesh services http://127.0.0.1:8000 -o merge
//! pdfmesh health http://127.0.0.1:8000
//! ```
//!
//! Orchestrator settings resolve as: flag, then `PDFMESH_*` environment
//! variable, then built-in default.

use anyhow::Result;
use argh::FromArgs;
use pdfmesh_common::OperationType;
use pdfmesh_orchestrator::{HttpServer, KnownCandidate, Orchestrator, OrchestratorConfig, SelectionMode};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Validates that a URL string starts with http://; https:// is refused
/// because the orchestrator client has no TLS connector.
fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if url.starts_with("https://") {
        anyhow::bail!("Invalid {}: '{}' uses https://, but TLS is not supported", description, url);
    }
    if !url.starts_with("http://") {
        anyhow::bail!("Invalid {}: '{}' must start with http://", description, url);
    }
    Ok(())
}

#[derive(FromArgs)]
/// PDFMesh - PDF microservices orchestrator
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Orchestrator(OrchestratorArgs),
    Services(ServicesArgs),
    Health(HealthArgs),
}

/// Arguments for running the orchestrator.
///
/// Every option left unset falls back to its `PDFMESH_*` environment
/// variable and then to the built-in default.
#[derive(FromArgs)]
#[argh(subcommand, name = "orchestrator")]
/// run the PDFMesh orchestrator
struct OrchestratorArgs {
    /// host to bind the HTTP server to (default: localhost)
    #[argh(option)]
    host: Option<String>,

    /// port to bind the HTTP server to (default: 8000)
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// base URL clients use to reach the orchestrator, used when rewriting
    /// download links (default: http://{host}:{port})
    #[argh(option, long = "public-url")]
    public_url: Option<String>,

    /// seconds between discovery passes (default: 30)
    #[argh(option, long = "discovery-interval")]
    discovery_interval: Option<u64>,

    /// seconds between health check passes (default: 10)
    #[argh(option, long = "health-check-interval")]
    health_check_interval: Option<u64>,

    /// timeout for each /info and /health probe in milliseconds (default: 5000)
    #[argh(option, long = "probe-timeout")]
    probe_timeout_ms: Option<u64>,

    /// timeout for each proxied worker call in seconds (default: 300)
    #[argh(option, long = "request-timeout")]
    request_timeout: Option<u64>,

    /// per-file upload limit in megabytes (default: 100)
    #[argh(option, long = "max-upload-mb")]
    max_upload_mb: Option<u64>,

    /// directory for POST /upload files (default: temp/orchestrator)
    #[argh(option, long = "upload-dir")]
    upload_dir: Option<String>,

    /// worker to poll, as op=host:port; repeatable. Replaces the standard
    /// port table when given.
    #[argh(option, short = 'c', long = "candidate")]
    candidates: Vec<String>,

    /// worker selection policy: first-healthy or round-robin
    #[argh(option, default = "\"first-healthy\".into()")]
    selection: String,

    /// prune services that are not healthy and have been unreachable for
    /// this many seconds (default: never)
    #[argh(option, long = "stale-after")]
    stale_after: Option<u64>,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "services")]
/// list services registered with a running orchestrator
struct ServicesArgs {
    /// orchestrator URL, e.g. http://127.0.0.1:8000
    #[argh(positional)]
    server_address: String,

    /// only list services for this operation type
    #[argh(option, short = 'o')]
    operation: Option<String>,

    /// print raw JSON instead of a table
    #[argh(switch)]
    json: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "health")]
/// show the health summary of a running orchestrator
struct HealthArgs {
    /// orchestrator URL, e.g. http://127.0.0.1:8000
    #[argh(positional)]
    server_address: String,
}

/// Applies flags on top of `base`, which already carries env and defaults.
fn build_config(args: OrchestratorArgs, mut config: OrchestratorConfig) -> Result<OrchestratorConfig> {
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(url) = args.public_url {
        config.public_url = Some(url);
    }
    if let Some(secs) = args.discovery_interval {
        config.discovery_interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.health_check_interval {
        config.health_check_interval = Duration::from_secs(secs);
    }
    if let Some(ms) = args.probe_timeout_ms {
        config.probe_timeout = Duration::from_millis(ms);
    }
    if let Some(secs) = args.request_timeout {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(mb) = args.max_upload_mb {
        config.max_file_size_mb = mb;
    }
    if let Some(dir) = args.upload_dir {
        config.upload_dir = PathBuf::from(dir);
    }
    if !args.candidates.is_empty() {
        config.candidates = args
            .candidates
            .iter()
            .map(|c| c.parse::<KnownCandidate>())
            .collect::<pdfmesh_common::Result<Vec<_>>>()?;
    }
    config.selection = args.selection.parse::<SelectionMode>()?;
    if let Some(secs) = args.stale_after {
        config.stale_after = Some(Duration::from_secs(secs));
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Inspection commands print to stdout; keep it free of log lines.
    if matches!(cli.command, Commands::Orchestrator(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Orchestrator(args) => run_orchestrator(args).await,
        Commands::Services(args) => run_services(args).await,
        Commands::Health(args) => run_health(args).await,
    }
}

async fn run_orchestrator(args: OrchestratorArgs) -> Result<()> {
    let config = build_config(args, OrchestratorConfig::from_env()?)?;

    tracing::info!("Starting PDFMesh orchestrator on {}:{}", config.host, config.port);
    tracing::info!("Public URL: {}", config.public_url());
    tracing::info!(
        "Polling {} candidates every {:?}, health checks every {:?}",
        config.candidates.len(),
        config.discovery_interval,
        config.health_check_interval
    );
    if config.candidates.is_empty() {
        tracing::warn!("No candidates configured; no services will be discovered");
    }

    let orchestrator = Arc::new(Orchestrator::new(config)?);
    orchestrator.start();

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal.cancel();
    });

    let result = HttpServer::new(orchestrator.clone()).run(shutdown).await;
    orchestrator.shutdown().await;
    result?;

    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

async fn run_services(args: ServicesArgs) -> Result<()> {
    validate_http_url(&args.server_address, "server address")?;
    let client = pdfmesh_client::OrchestratorClient::new(&args.server_address)?;

    let services = match &args.operation {
        Some(op) => client.services_for(op.parse::<OperationType>()?).await?,
        None => client.services().await?,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&services)?);
    } else {
        print!("{}", pdfmesh_cli::report::services_table(&services));
    }
    Ok(())
}

async fn run_health(args: HealthArgs) -> Result<()> {
    validate_http_url(&args.server_address, "server address")?;
    let client = pdfmesh_client::OrchestratorClient::new(&args.server_address)?;

    let health = client.health().await?;
    print!("{}", pdfmesh_cli::report::health_summary(&health));
    Ok(())
}
