use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shareit::config::Config;
use shareit::gateway::GatewayState;

#[derive(Parser, Debug)]
#[command(name = "shareit-gateway")]
#[command(author, version, about = "Validating gateway for the ShareIt server", long_about = None)]
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

    let config = Config::load(&cli.config)?;

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

    tracing::info!("Starting ShareIt gateway v{}", env!("CARGO_PKG_VERSION"));

    let state = Arc::new(GatewayState::new(config.gateway.server_url.clone()));
    let app = shareit::gateway::create_router(state);

    let addr = format!("{}:{}", config.server.host, config.gateway.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("ShareIt gateway listening on http://{}", addr);
    tracing::info!("Forwarding to {}", config.gateway.server_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shareit::utils::shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}
