//! Ferry CI coordinator entrypoint.

use anyhow::Context;
use clap::Parser;
use ferry_api::{Coordinator, CoordinatorConfig};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

#[derive(Parser)]
#[command(name = "ferry-coordinator")]
#[command(author, version, about = "Ferry CI coordinator", long_about = None)]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(short, long, env = "FERRY_COORDINATOR_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration.
    #[arg(long)]
    listen: Option<String>,

    /// Repository location sent to agents, overriding the configuration.
    #[arg(long)]
    source: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => CoordinatorConfig::from_file(path)?,
        None => CoordinatorConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(source) = cli.source {
        config.source_location = source;
    }

    ferry_trace::init_logging(&config.logging)?;

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    Coordinator::new(config)?.run(listener, shutdown_rx).await?;
    Ok(())
}
