//! slm-analysis - Audio Analysis Consensus microservice
//!
//! Collects estimates from several analyzer backends for each uploaded
//! sample, reconciles them into one value per property with a calibrated
//! confidence, and stores every run as an auditable snapshot.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use slm_analysis::config::{AnalysisServiceConfig, DEFAULT_PORT, MODULE_NAME};
use slm_analysis::AppState;
use slm_common::config::{module_config_path, RootFolderInitializer, RootFolderResolver};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "slm-analysis")]
#[command(about = "Audio analysis consensus service for the sample library manager")]
#[command(version)]
struct Args {
    /// HTTP port (overrides config file)
    #[arg(short, long, env = "SLM_ANALYSIS_PORT")]
    port: Option<u16>,

    /// Root folder holding slm.db
    #[arg(short, long, env = "SLM_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Service configuration file
    #[arg(short, long, env = "SLM_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config before logging: it carries the log level and file
    let config_path = args
        .config
        .clone()
        .or_else(|| module_config_path(MODULE_NAME));
    let config = match &config_path {
        Some(path) => AnalysisServiceConfig::load(path)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?,
        None => AnalysisServiceConfig::default(),
    };

    slm_common::logging::init_logging(&config.logging)
        .context("Failed to initialize logging")?;

    info!("Starting slm-analysis (Audio Analysis Consensus) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    // Step 1: Resolve root folder (TOML key read from the same config file)
    let root_folder = RootFolderResolver::new(MODULE_NAME)
        .with_cli_arg(args.root_folder)
        .with_config_file(config_path.clone())
        .resolve();

    // Step 2: Create root folder directory if missing
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", initializer.root_folder().display());

    // Step 3: Open or create database
    let db_path = initializer.database_path();
    if initializer.database_exists() {
        info!("Opening existing database: {}", db_path.display());
    } else {
        info!("Creating new database: {}", db_path.display());
    }
    let db_pool = slm_analysis::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    // Step 4: Register analyzers
    let orchestrator = config
        .build_orchestrator()
        .context("Failed to create analyzer clients")?;
    let registered = orchestrator.analyzer_ids().len();
    if registered == 0 {
        info!("No analyzers configured; only submitted estimates will be analyzed");
    } else {
        info!("{} analyzer(s) registered", registered);
    }

    let state = AppState::new(db_pool, orchestrator);
    let app = slm_analysis::build_router(state);

    let port = args.port.unwrap_or(if config.port == 0 { DEFAULT_PORT } else { config.port });
    let addr = format!("127.0.0.1:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
