use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use transmute_core::{
    load_config, validate_config, ArtifactStore, FsArtifactStore, JobLedger, JobOrchestrator,
    JobRunner, ProcessorRegistry, SqliteJobLedger, TinyUrlShortener, UrlShortener,
};
use transmute_server::api::create_router;
use transmute_server::state::AppState;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    let json = std::env::var("TRANSMUTE_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn run() -> Result<()> {
    init_logging();

    // Determine config path
    let config_path = std::env::var("TRANSMUTE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Storage root: {:?}", config.storage.root);
    info!("Ledger path: {:?}", config.ledger.path);

    // Artifact store
    let store: Arc<dyn ArtifactStore> = Arc::new(
        FsArtifactStore::open(&config.storage)
            .await
            .context("Failed to open artifact store")?,
    );
    info!(
        input = %config.storage.input_container,
        output = %config.storage.output_container,
        "Artifact store initialized"
    );

    // Job ledger
    let ledger: Arc<dyn JobLedger> = Arc::new(
        SqliteJobLedger::new(&config.ledger.path).context("Failed to open job ledger")?,
    );
    info!("Job ledger initialized");

    // Processors
    let registry = ProcessorRegistry::with_defaults(&config.tools);
    for (processor, e) in registry.validate_all().await {
        warn!(processor = %processor, "Processor unavailable: {}", e);
    }
    for route in registry.routes() {
        info!(rule = %route.rule, processor = %route.processor, "Registered route");
    }

    // Job runner if enabled
    let runner = if config.orchestrator.enabled {
        let mut orchestrator = JobOrchestrator::new(
            config.orchestrator.clone(),
            config.ledger.partition.clone(),
            Arc::clone(&store),
            Arc::clone(&ledger),
            Arc::new(registry),
        );

        if config.shortener.enabled {
            match TinyUrlShortener::new(&config.shortener) {
                Ok(shortener) => {
                    info!("URL shortener enabled at {}", config.shortener.endpoint);
                    let shortener: Arc<dyn UrlShortener> = Arc::new(shortener);
                    orchestrator = orchestrator.with_shortener(
                        shortener,
                        Duration::from_millis(config.shortener.timeout_ms),
                    );
                }
                Err(e) => error!("Failed to create URL shortener: {}", e),
            }
        }

        let runner = Arc::new(JobRunner::new(Arc::new(orchestrator)));
        runner.start().await;
        info!("Job runner started");
        Some(runner)
    } else {
        info!("Orchestrator disabled in config");
        None
    };

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        store,
        ledger,
        runner.clone(),
    ));

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

    info!("Server shutting down...");

    // Stop runner if running
    if let Some(ref runner) = runner {
        info!("Stopping job runner...");
        runner.stop().await;
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
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
                error!("Failed to install SIGTERM handler: {}", e);
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
}
