//! Chesster server
//!
//! Spawns the configured UCI engine once and serves move suggestions over
//! HTTP and WebSocket until interrupted.

use chesster_server::{router, AppState};
use clap::Parser;
use engine_adapter::{ChessterConfig, EngineAdapter};
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::signal;
use tracing_subscriber::EnvFilter;

/// Chess move suggestion server backed by a UCI engine.
#[derive(Parser)]
#[command(name = "chesster-server")]
#[command(about = "Serves engine move suggestions over HTTP and WebSocket")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "chesster.toml")]
    config: PathBuf,

    /// Port to listen on (overrides the config file)
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Engine executable (overrides the config file)
    #[arg(long, env = "CHESSTER_ENGINE")]
    engine: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let mut config = ChessterConfig::load_from(&args.config)?;
    if let Some(engine) = args.engine {
        config.engine.path = engine;
    }
    let port = args.port.unwrap_or(config.server.port);

    let mut engine = EngineAdapter::new(config.engine);
    if let Err(e) = engine.initialize().await {
        tracing::error!("Failed to initialize engine: {}", e);
        tracing::error!(
            "Make sure the engine is installed, or set CHESSTER_ENGINE / [engine] path"
        );
        std::process::exit(1);
    }
    tracing::info!(
        "Engine initialized: {}",
        engine.engine_name().as_deref().unwrap_or("unknown")
    );

    let state = AppState::new(engine);
    let app = router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = signal::ctrl_c().await {
                tracing::error!("Failed to listen for ctrl+c: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down server...");
        })
        .await?;

    state.engine.lock().await.quit().await;
    Ok(())
}
