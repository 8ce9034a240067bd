use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use wechat_rag_bridge::config::loader::load_config;
use wechat_rag_bridge::lifecycle::{trigger_on_ctrl_c, Shutdown};
use wechat_rag_bridge::observability::metrics;
use wechat_rag_bridge::{BridgeConfig, HttpServer};

#[derive(Parser)]
#[command(name = "wechat-rag-bridge")]
#[command(about = "WeChat Official Account webhook bridged to a RAGFlow QA backend")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => match load_config(std::path::Path::new("config.toml")) {
            Ok(config) => config,
            Err(_) => BridgeConfig::default(),
        },
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "wechat_rag_bridge={},tower_http=warn",
                    config.observability.log_level
                ))
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("wechat-rag-bridge v0.1.0 starting");
    tracing::info!(
        bind_address = %config.server.bind_address,
        ragflow_base_url = %config.ragflow.base_url,
        local_reply_secs = config.timeouts.local_reply_secs,
        max_retries = config.retry.max_retries,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(error) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                %error,
                "failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "listening for webhook calls");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    trigger_on_ctrl_c(shutdown);

    let server = HttpServer::new(config)?;
    server.run(listener, server_shutdown).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
