//! prism-mi (Metrics Import) - Snapshot reconciliation service
//!
//! Accepts metric rows from the audit dashboard and the sheet sync script,
//! reconciles them against the authoritative snapshot (sheet wins unless
//! forced) and serves the snapshot back for dashboard visualisation.
//!
//! Default port: 4001

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use prism_common::config::{default_config_path, ConfigOverrides, TomlConfig};
use prism_common::store::JsonFileStore;
use prism_mi::{build_router, AppState};
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for prism-mi
#[derive(Parser, Debug)]
#[command(name = "prism-mi")]
#[command(about = "Metrics import reconciliation service for Prism")]
#[command(version)]
struct Args {
    /// TOML configuration file (default: <config dir>/prism/config.toml)
    #[arg(short, long, env = "PRISM_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long, env = "PRISM_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "PRISM_PORT")]
    port: Option<u16>,

    /// Snapshot JSON file
    #[arg(short, long, env = "PRISM_SNAPSHOT_PATH")]
    snapshot: Option<PathBuf>,

    /// Log level when RUST_LOG is not set
    #[arg(long, env = "PRISM_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is loaded before the subscriber exists (it supplies the log
    // level), so the file in use is reported once logging is up
    let file_config = TomlConfig::load(args.config.as_deref());
    let log_level = args
        .log_level
        .clone()
        .or_else(|| file_config.as_ref().ok().map(|c| c.logging.level.clone()))
        .unwrap_or_else(|| "info".to_string());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("prism_mi={level},prism_common={level},tower_http={level}", level = log_level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Prism Metrics Import (prism-mi) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match args.config.clone().or_else(default_config_path) {
        Some(path) if path.exists() => info!("Config file: {}", path.display()),
        Some(path) => info!("Config file: {} (not found, using defaults)", path.display()),
        None => info!("Config file: none (using defaults)"),
    }

    let config = file_config
        .context("Failed to load configuration")?
        .with_overrides(ConfigOverrides {
            host: args.host,
            port: args.port,
            snapshot_path: args.snapshot,
            log_level: args.log_level,
        });
    config.validate().context("Invalid configuration")?;

    let store = JsonFileStore::new(config.store.snapshot_path.clone());
    info!("Snapshot store: {}", store.path().display());

    let state = AppState::new(Arc::new(store), &config).context("Failed to build application state")?;
    info!(
        max_rows = config.import.max_rows,
        timeout_ms = config.server.request_timeout_ms,
        cache_ttl_secs = state.cache.ttl().as_secs(),
        "Import service ready"
    );
    let app = build_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("prism-mi listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
