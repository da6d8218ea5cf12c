//! Facility Insights HTTP Server
//!
//! Exposes the insights pipeline over HTTP against a remote time-series store.
//!
//! # Endpoints
//!
//! - `POST /timeseries/datapoint` - Ingest one datapoint
//! - `POST /timeseries/get-co2-measurements` - Flattened measurements
//! - `POST /timeseries/get-co2-concentration` - Single inspection reading
//! - `POST /insights/consolidate-co2-measurements` - Per-series indicators
//! - `GET /health` - Health check
//! - `GET /metrics` - Prometheus metrics
//!
//! # CLI Commands
//!
//! - `start` - Start the HTTP server (default if no command specified)
//! - `check-config` - Validate configuration file
//!
//! # Configuration
//!
//! The server reads configuration from:
//! 1. `--config` path
//! 2. `INSIGHTS_CONFIG` environment variable (path to TOML file)
//! 3. `./application.toml` in current directory
//! 4. Default configuration
//!
//! `INSIGHTS_*` environment variables override file values.

use clap::{Parser, Subcommand};
use facility_insights::{
    api::{build_router, AppState},
    config::Config,
    metrics,
    store::{HttpTimeSeriesStore, TimeSeriesStore},
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use tokio::signal;
use tracing::{debug, info, warn};

// =============================================================================
// CLI Definition
// =============================================================================

/// Facility Insights - batched CO2 measurement queries and indicators
#[derive(Parser)]
#[command(name = "insights-server")]
#[command(version)]
#[command(about = "Batched time-series queries and per-series indicators over a remote store", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to configuration file (overrides INSIGHTS_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override listen address (e.g., 0.0.0.0:8200)
    #[arg(short, long, global = true)]
    listen: Option<SocketAddr>,

    /// Override the remote store base URL
    #[arg(long, global = true)]
    store_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server (default)
    Start,

    /// Validate configuration file without starting the server
    CheckConfig,
}

/// Load configuration and apply CLI overrides
fn resolve_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(listen) = cli.listen {
        config.server.host = listen.ip().to_string();
        config.server.port = listen.port();
    }
    if let Some(url) = &cli.store_url {
        config.store.base_url = url.clone();
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// CLI Command Handlers
// =============================================================================

/// Validate configuration and print summary
fn cmd_check_config(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(cli)?;

    println!("Configuration is valid!");
    println!();
    println!("Server Settings:");
    println!("  Listen address: {}", config.listen_addr());
    println!("  Log level: {}", config.server.log_level);
    println!();
    println!("Store Settings:");
    println!("  Base URL: {}", config.store.base_url);
    println!("  Request timeout: {}s", config.store.request_timeout_secs);
    println!();
    println!("Query Settings:");
    println!(
        "  Max items per request: {}",
        config.query.max_items_per_request
    );
    println!(
        "  Max concurrent batches: {}",
        config.query.max_concurrent_batches
    );
    println!(
        "  Descriptor lookup concurrency: {}",
        config.query.descriptor_lookup_concurrency
    );
    match config.query.deadline() {
        Some(deadline) => println!("  Deadline: {}s", deadline.as_secs()),
        None => println!("  Deadline: none"),
    }
    println!();
    println!("Insights:");
    println!(
        "  Measurement description: {}",
        config.insights.measurement_description
    );
    println!(
        "  Excluded robot: {}",
        config
            .insights
            .excluded_robot_name
            .as_deref()
            .unwrap_or("none")
    );

    Ok(())
}

// =============================================================================
// Server Setup
// =============================================================================

/// Resolves when the process is asked to stop
///
/// A signal whose handler cannot be installed is logged and never fires.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl+C, only SIGTERM will stop the server");
            std::future::pending::<()>().await;
        }
        "SIGINT"
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Cannot listen for SIGTERM, only Ctrl+C will stop the server");
                std::future::pending::<()>().await;
            }
        }
        "SIGTERM"
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<&'static str>();

    let received = tokio::select! {
        name = interrupt => name,
        name = terminate => name,
    };
    info!(signal = received, "Draining in-flight insights requests");
}

async fn cmd_start(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = resolve_config(cli)?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    info!(
        "Starting Facility Insights Server v{}",
        env!("CARGO_PKG_VERSION")
    );
    debug!(
        listen_addr = %config.listen_addr(),
        store_url = %config.store.base_url,
        max_items_per_request = config.query.max_items_per_request,
        "Configuration loaded"
    );

    metrics::init();

    let store: Arc<dyn TimeSeriesStore> = Arc::new(HttpTimeSeriesStore::new(
        &config.store.base_url,
        Duration::from_secs(config.store.request_timeout_secs),
    )?);
    info!(store = store.store_id(), url = %config.store.base_url, "Remote store client ready");

    let listen_addr = config.listen_addr();
    let state = Arc::new(AppState::new(store, config)?);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&listen_addr).await?;
    info!("Server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::CheckConfig) => cmd_check_config(&cli),
        Some(Commands::Start) | None => cmd_start(&cli).await,
    }
}
