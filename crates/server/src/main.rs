mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pilotfish_core::{
    load_config, validate_config, BasecallPipeline, Basecaller, HttpRunFileStore, HttpRunRegistry,
    RunFileStore, RunRegistry, TcpBasecaller,
};

use api::create_router;
use state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("PILOTFISH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("pilotfish.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Run registry: {}", config.registry.url);
    info!(
        "Basecaller endpoint: {}:{}",
        config.basecaller.host, config.basecaller.port
    );
    info!("FASTQ output directory: {:?}", config.pipeline.output_dir);

    // Create registry client
    let registry: Arc<dyn RunRegistry> = Arc::new(
        HttpRunRegistry::new(config.registry.clone())
            .context("Failed to create run registry client")?,
    );
    info!("Run registry client initialized");

    // Create run file store
    let store: Arc<dyn RunFileStore> = Arc::new(
        HttpRunFileStore::new(config.registry.clone())
            .context("Failed to create run file store")?,
    );
    info!("Run file store initialized");

    // Create basecaller client
    let basecaller: Arc<dyn Basecaller> =
        Arc::new(TcpBasecaller::new(config.basecaller.clone()));
    info!(
        "Basecaller client initialized (profile: {})",
        config.basecaller.profile
    );

    // Create the relay pipeline
    let pipeline = Arc::new(BasecallPipeline::new(
        config.pipeline.clone(),
        registry,
        store,
        basecaller,
    ));

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), pipeline));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
