use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::filter::LevelFilter;

use hisensed::Config;
use hisensed::Engine;

/// Hisense TV bridge daemon
#[derive(Debug, Parser)]
#[command(name = "hisensed", version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "hisensed.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)?;

    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::from(config.logging.level))
        .init();

    tracing::info!("hisensed starting");
    tracing::info!("Loaded config from: {}", args.config.display());

    // Create the engine and register configured integrations
    let mut engine = Engine::new();
    engine.register_integrations_from_config(&config)?;
    let engine = Arc::new(engine);

    if config.integrations.hisense.is_empty() {
        tracing::warn!("No TVs configured; the daemon will serve an empty state");
    }

    // Engine event loop
    let engine_task = tokio::spawn({
        let engine = engine.clone();
        async move {
            if let Err(e) = engine.run().await {
                tracing::error!("Engine exited with error: {}", e);
            }
        }
    });

    // HTTP API, when configured
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let api_task = config.api.as_ref().map(|api_config| {
        let engine = engine.clone();
        let bind = api_config.bind.clone();
        let port = api_config.port;
        tokio::spawn(async move {
            if let Err(e) = hisensed::api::serve(bind, port, engine, shutdown_rx).await {
                tracing::error!("HTTP API server failed: {}", e);
            }
        })
    });

    tracing::info!("hisensed running, press Ctrl+C to exit");

    // Wait for Ctrl+C
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received shutdown signal");
        }
        Err(e) => {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
    }

    // Shut the API down gracefully; the engine and poll tasks are aborted
    let _ = shutdown_tx.send(());
    if let Some(task) = api_task {
        let _ = task.await;
    }
    engine_task.abort();

    tracing::info!("hisensed shutdown complete");

    Ok(())
}
