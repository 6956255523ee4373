//! LexMask Server
//!
//! This server provides:
//! - Entity detection and span masking for legal documents on /api/mask
//! - Analysis with a risk rating on /api/analyze
//! - A detector ladder (model NER + patterns, linguistic, patterns only)
//!   negotiated at startup and re-negotiated on /api/admin/reload, which is
//!   served on a separate admin listener (loopback by default)
//! - Health, readiness and Prometheus endpoints
//!
//! Usage:
//! ```bash
//! # With config file
//! lexmask-server --config lexmask.yaml
//!
//! # Or with environment variables
//! LEXMASK_MODEL_ENDPOINT=http://127.0.0.1:8090/ner lexmask-server
//!
//! # Mask a file offline and print the JSON report
//! lexmask-server mask --input deposition.txt --representation token
//! ```
//!
//! Test with:
//! ```bash
//! curl http://localhost:8002/api/mask \
//!   -H "Content-Type: application/json" \
//!   -d '{"text": "John Smith called 555-123-4567 on 01/02/2023"}'
//! ```

mod bootstrap;
mod config;

use anyhow::Context;
use clap::{Parser, Subcommand};
use config::ServerConfig;
use lexmask_ingress::{AppState, MaskRequest, MaskResponse, RegistryReadiness};
use lexmask_observability::{HealthState, Metrics, health_router};
use lexmask_pii::{DetectorCandidates, DetectorLadder, DetectorRegistry, MaskingEngine, MaskStyle};
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Level, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// LexMask Server - legal document entity masking
#[derive(Parser)]
#[command(name = "lexmask-server", version)]
#[command(about = "LexMask entity detection and masking service", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (YAML or TOML)
    #[arg(
        short,
        long,
        value_name = "FILE",
        env = "LEXMASK_CONFIG",
        global = true
    )]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, global = true)]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, global = true)]
    port: Option<u16>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the LexMask server (default if no command specified)
    Serve,
    /// Mask a file (or stdin) and print the JSON report
    Mask {
        /// Input file; reads stdin when omitted
        #[arg(short, long, value_name = "FILE")]
        input: Option<PathBuf>,

        /// Replacement style
        #[arg(short, long, value_enum)]
        representation: Option<Representation>,

        /// Only run the pattern table, skipping any configured remote detector
        #[arg(long, default_value = "false")]
        patterns_only: bool,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Representation {
    Token,
    Character,
}

impl From<Representation> for MaskStyle {
    fn from(value: Representation) -> Self {
        match value {
            Representation::Token => MaskStyle::Token,
            Representation::Character => MaskStyle::Character,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &cli.config {
        ServerConfig::from_file(config_path)?
    } else {
        ServerConfig::default()
    };

    // Merge environment variables (they override config file)
    config.merge_env();

    // CLI flags have the highest precedence
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    config.validate()?;

    let offline = matches!(cli.command, Some(Commands::Mask { .. }));
    init_tracing(&config, offline)?;

    match &cli.config {
        Some(path) => info!("📁 Loaded configuration from: {}", path.display()),
        None => info!("📁 Using default configuration"),
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Mask {
            input,
            representation,
            patterns_only,
        } => mask_file(config, input, representation, patterns_only).await,
    }
}

/// Initialize tracing with the configured level
///
/// The offline command logs to stderr so stdout carries only the report.
fn init_tracing(config: &ServerConfig, offline: bool) -> anyhow::Result<()> {
    let log_level = match config.logging.level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let level = if offline && log_level > Level::WARN {
        Level::WARN
    } else {
        log_level
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    if config.logging.json {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    info!("🚀 Initializing LexMask v{}", env!("CARGO_PKG_VERSION"));

    let engine = bootstrap::build_engine(&config).await?;

    // Initialize observability
    info!("📊 Initializing observability (metrics, health endpoints)");
    let metrics = Arc::new(Metrics::new()?);
    metrics.set_ladder_mode(engine.capabilities().mode.rung());

    let readiness = Arc::new(RegistryReadiness::new(engine.registry().clone()));
    let health_state = HealthState::with_readiness_checker(metrics.clone(), readiness);

    if config.logging.log_requests {
        info!("📋 Request summary logging enabled");
    }

    let state = AppState::new(engine.clone())
        .with_defaults(config.masking.request_defaults())
        .with_metrics(metrics)
        .with_request_logging(config.logging.log_requests);

    let admin = if config.admin.enabled {
        let admin_addr: SocketAddr = format!("{}:{}", config.admin.host, config.admin.port)
            .parse()
            .with_context(|| {
                format!(
                    "Invalid admin address {}:{}",
                    config.admin.host, config.admin.port
                )
            })?;
        let admin_listener = TcpListener::bind(admin_addr).await?;
        let admin_app = lexmask_ingress::admin_router(state.clone());
        info!("🔧 Admin endpoints on http://{}/api/admin/reload", admin_addr);
        Some(tokio::spawn(async move {
            axum::serve(admin_listener, admin_app)
                .with_graceful_shutdown(shutdown_signal())
                .await
        }))
    } else {
        info!("🔧 Admin endpoints disabled");
        None
    };

    // Combine routers
    let app = lexmask_ingress::router(state)
        .layer(config.cors.layer())
        .merge(health_router(health_state));

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr).await?;

    let capabilities = engine.capabilities();
    info!("");
    info!("✅ LexMask listening on http://{}", addr);
    info!(
        "   Detector ladder: {} (primary: {})",
        capabilities.mode, capabilities.primary_detector
    );
    info!("   API endpoints:");
    info!("   - Mask:               http://{}/api/mask", addr);
    info!("   - Analyze:            http://{}/api/analyze", addr);
    info!("   - Supported entities: http://{}/api/supported-entities", addr);
    info!("   - Capabilities:       http://{}/api/capabilities", addr);
    info!("   Observability:");
    info!("   - Health check:       http://{}/healthz", addr);
    info!("   - Readiness check:    http://{}/readyz", addr);
    info!("   - Prometheus metrics: http://{}/metrics", addr);
    info!("");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(admin) = admin {
        admin.await??;
    }

    info!("Server stopped");
    Ok(())
}

async fn mask_file(
    config: ServerConfig,
    input: Option<PathBuf>,
    representation: Option<Representation>,
    patterns_only: bool,
) -> anyhow::Result<()> {
    let text = match &input {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            buf
        }
    };

    let engine = if patterns_only {
        let candidates = bootstrap::build_candidates(&config.detectors)?;
        let candidates = DetectorCandidates::patterns_only(candidates.pattern);
        let ladder = DetectorLadder::select(&candidates, Default::default());
        let registry = Arc::new(DetectorRegistry::with_ladder(candidates, ladder));
        Arc::new(MaskingEngine::new(registry, config.masking.engine_config()))
    } else {
        bootstrap::build_engine(&config).await?
    };

    let mut defaults = config.masking.request_defaults();
    if let Some(representation) = representation {
        defaults.representation = representation.into();
    }

    let request = MaskRequest {
        text,
        ..Default::default()
    };
    let policy = defaults.policy_for(&request, defaults.mask_threshold)?;
    let report = engine.mask(&request.text, &policy).await?;

    for run in report.runs.iter().filter(|r| r.failed) {
        warn!("{} detector failed; its entities are missing from the report", run.detector);
    }

    let response = MaskResponse::from(report);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
