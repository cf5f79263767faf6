//! Coordinator bootstrap: scheduler, liveness monitor and HTTP server.

use crate::config::CoordinatorConfig;
use crate::routes::create_router;
use crate::state::AppState;
use axum::Router;
use ferry_core::ports::AgentTransport;
use ferry_core::{Error, Result};
use ferry_scheduler::{LivenessMonitor, Scheduler};
use ferry_transport::{HttpAgentTransport, TransportConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

pub struct Coordinator {
    config: CoordinatorConfig,
    scheduler: Arc<Scheduler>,
}

impl Coordinator {
    /// Create a coordinator that dispatches to agents over HTTP.
    pub fn new(config: CoordinatorConfig) -> Result<Self> {
        let transport = HttpAgentTransport::new(&TransportConfig::with_request_timeout(
            config.dispatch_timeout(),
        ))?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: CoordinatorConfig, transport: Arc<dyn AgentTransport>) -> Self {
        let scheduler = Arc::new(Scheduler::new(config.scheduler_config(), transport));
        Self { config, scheduler }
    }

    pub fn scheduler(&self) -> Arc<Scheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn router(&self) -> Router {
        create_router(Arc::new(AppState::new(self.scheduler())))
    }

    /// Serve on `listener` until `shutdown` flips to true.
    pub async fn run(self, listener: TcpListener, shutdown: watch::Receiver<bool>) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            listen = %local_addr,
            source_location = %self.config.source_location,
            registration_policy = ?self.config.registration_policy,
            "Starting coordinator"
        );

        if self.config.liveness.enabled {
            let monitor = LivenessMonitor::new(self.scheduler(), self.config.liveness.clone());
            let monitor_shutdown = shutdown.clone();
            tokio::spawn(async move { monitor.run(monitor_shutdown).await });
        }

        let mut shutdown = shutdown;
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
            .map_err(Error::Io)?;

        info!("Coordinator stopped");
        Ok(())
    }
}
