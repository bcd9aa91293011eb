use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use gort_api_rust::config::{self, AppConfig};
use gort_api_rust::dataaccess::MemoryDataAccess;
use gort_api_rust::middleware::spawn_request_logger;
use gort_api_rust::server::RestServer;
use gort_api_rust::telemetry;

#[derive(Parser)]
#[command(name = "gort-api-rust")]
#[command(about = "Gort REST API server")]
#[command(version)]
struct Cli {
    #[arg(long, help = "Address to listen on (overrides GORT_API_ADDR)")]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up GORT_* settings
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config: AppConfig = config::config().clone();
    if let Some(addr) = cli.addr {
        config.server.bind_addr = addr;
    }
    tracing::info!("Starting Gort API in {:?} mode", config.environment);

    let metrics = if config.telemetry.enable_metrics {
        telemetry::install_recorder().context("failed to install metrics recorder")?
    } else {
        telemetry::detached_handle()
    };

    let dal = Arc::new(MemoryDataAccess::new());
    let server = RestServer::build(dal, &config, metrics)
        .await
        .context("data access layer did not initialize")?;

    if config.server.enable_request_logging {
        spawn_request_logger(server.requests());
    }

    server.listen_and_serve(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
