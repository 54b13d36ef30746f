use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shareit::clock::Clock;
use shareit::config::Config;
use shareit::AppState;

#[derive(Parser, Debug)]
#[command(name = "shareit")]
#[command(author, version, about = "A peer-to-peer item rental service", long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "shareit.toml")]
    config: PathBuf,

    /// Override log level
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    // Initialize logging
    let log_level = cli
        .log_level
        .as_ref()
        .unwrap_or(&config.logging.level)
        .clone();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting ShareIt server v{}", env!("CARGO_PKG_VERSION"));

    // Ensure data directory exists
    shareit::utils::ensure_dir(&config.server.data_dir)?;

    // Initialize database
    let db = shareit::db::init(&config.server.data_dir).await?;

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), db, Clock::system()));

    let app = shareit::api::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("ShareIt server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shareit::utils::shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}
