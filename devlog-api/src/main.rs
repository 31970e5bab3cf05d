//! devlog-api - REST service for dated, project-scoped journal entries
//!
//! Settings resolve command line → environment → TOML file → defaults.

use anyhow::{Context, Result};
use clap::Parser;
use devlog_common::config::{
    load_toml_config, ConfigOverrides, ConfigSource, ServiceConfig,
};
use devlog_common::db::connect_from_config;
use devlog_api::{build_router, AppState};
use std::path::PathBuf;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "devlog-api")]
#[command(about = "REST service for dated, project-scoped journal entries", version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "DEVLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address
    #[arg(long, env = "DEVLOG_HOST")]
    host: Option<String>,

    /// HTTP port
    #[arg(short, long, env = "DEVLOG_PORT")]
    port: Option<u16>,

    /// PostgreSQL connection string (selects the hosted backend)
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    database_url: Option<String>,

    /// SQLite database file (used when no database URL is set)
    #[arg(long, env = "DEVLOG_SQLITE_PATH")]
    sqlite_path: Option<PathBuf>,

    /// Shared API token
    #[arg(long, env = "DEVLOG_API_TOKEN", hide_env_values = true)]
    api_token: Option<String>,

    /// Comma-separated projects accepted on write
    #[arg(long, env = "DEVLOG_ALLOWED_PROJECTS", value_delimiter = ',')]
    allowed_projects: Option<Vec<String>>,

    /// Log level or filter directive (RUST_LOG takes precedence when set)
    #[arg(long, env = "DEVLOG_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            host: self.host.clone(),
            port: self.port,
            database_url: self.database_url.clone(),
            sqlite_path: self.sqlite_path.clone(),
            api_token: self.api_token.clone(),
            allowed_projects: self.allowed_projects.clone(),
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The config file may set the log level, so it is read before tracing
    // starts; its source is logged below once the subscriber exists
    let (toml, config_source) =
        load_toml_config(args.config.as_deref()).context("Failed to load config file")?;
    let config = ServiceConfig::resolve(args.overrides(), toml);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.log_level))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting devlog-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match &config_source {
        ConfigSource::File(_) => info!("Config file: {}", config_source),
        _ => warn!("Config file: {}", config_source),
    }
    info!("Configuration: {:?}", config);

    if config.api_token.is_none() {
        warn!("No API token configured: protected routes will answer 500");
    }
    if !config.allowed_projects.is_empty() {
        info!("Writes restricted to projects: {}", config.allowed_projects.join(", "));
    }

    let selection = config.store_selection();
    info!("Storage backend: {}", selection.backend());
    let store = connect_from_config(&selection)
        .await
        .context("Failed to open entry store")?;

    let state = AppState::new(
        store.clone(),
        config.api_token.clone(),
        config.allowed_projects.clone(),
    );
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("devlog-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    store.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
