//! Ferry CI agent entrypoint.

use anyhow::Context;
use clap::Parser;
use ferry_agent::{AgentConfig, BuildAgent};
use std::path::PathBuf;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "ferry-agent")]
#[command(author, version, about = "Ferry CI build agent", long_about = None)]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(short, long, env = "FERRY_AGENT_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration.
    #[arg(long)]
    listen: Option<String>,

    /// Coordinator base URL, overriding the configuration.
    #[arg(long)]
    coordinator: Option<String>,

    /// Host name announced to the coordinator.
    #[arg(long)]
    advertise_host: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AgentConfig::from_file(path)?,
        None => AgentConfig::default(),
    };
    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(coordinator) = cli.coordinator {
        config.coordinator_url = coordinator;
    }
    if let Some(host) = cli.advertise_host {
        config.advertise_host = host;
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

    let agent = BuildAgent::new(config)?;
    if let Err(e) = agent.run(listener, shutdown_rx).await {
        error!(error = %e, "Agent stopped");
        return Err(e.into());
    }

    Ok(())
}
