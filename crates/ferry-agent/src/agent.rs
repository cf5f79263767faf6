//! Agent bootstrap: serve the build endpoint, then register.

use crate::config::AgentConfig;
use crate::registration::Registrar;
use crate::routes::create_router;
use crate::service::AgentService;
use ferry_core::ports::CoordinatorTransport;
use ferry_core::{Error, Result};
use ferry_runner::PipelineRunner;
use ferry_transport::{HttpCoordinatorTransport, TransportConfig};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

/// The build agent.
pub struct BuildAgent {
    config: AgentConfig,
    service: Arc<AgentService>,
    coordinator: Arc<dyn CoordinatorTransport>,
}

impl BuildAgent {
    /// Create an agent talking to the configured coordinator over HTTP.
    pub fn new(config: AgentConfig) -> Result<Self> {
        let transport = HttpCoordinatorTransport::new(
            config.coordinator_url.clone(),
            &TransportConfig::with_request_timeout(config.report_timeout()),
        )?;
        Ok(Self::with_coordinator(config, Arc::new(transport)))
    }

    pub fn with_coordinator(
        config: AgentConfig,
        coordinator: Arc<dyn CoordinatorTransport>,
    ) -> Self {
        let runner = PipelineRunner::new(config.runner.clone());
        let service = Arc::new(AgentService::new(
            runner,
            Arc::clone(&coordinator),
            config.report_timeout(),
        ));
        Self {
            config,
            service,
            coordinator,
        }
    }

    pub fn service(&self) -> Arc<AgentService> {
        Arc::clone(&self.service)
    }

    /// Serve on `listener` and register with the coordinator. Returns an
    /// error without serving further if registration fails; otherwise runs
    /// until `shutdown` flips to true.
    pub async fn run(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let local_addr = listener.local_addr()?;
        let advertise = self.config.advertise_address(local_addr.port());

        info!(listen = %local_addr, advertise = %advertise, "Starting build agent");

        let router = create_router(Arc::clone(&self.service));
        let server = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move {
                    let _ = shutdown.wait_for(|stop| *stop).await;
                })
                .await
        });

        let registrar = Registrar::new(
            Arc::clone(&self.coordinator),
            &advertise,
            self.config.registration.clone(),
        );
        if let Err(e) = registrar.run().await {
            server.abort();
            return Err(e);
        }

        info!(advertise = %advertise, "Agent ready for builds");

        match server.await {
            Ok(result) => result.map_err(Error::Io),
            Err(e) => Err(Error::Internal(format!("Agent server task failed: {}", e))),
        }
    }
}
