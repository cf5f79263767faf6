//! Agent → coordinator calls.

use crate::client::{TransportConfig, check_status, join, send_error};
use async_trait::async_trait;
use ferry_core::Result;
use ferry_core::ports::CoordinatorTransport;
use ferry_core::protocol::{BuildResultReport, RegisterAgentRequest};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

/// Registers an agent and reports its build results to one coordinator.
pub struct HttpCoordinatorTransport {
    client: Client,
    base_url: String,
}

impl HttpCoordinatorTransport {
    pub fn new(base_url: impl Into<String>, config: &TransportConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<T: Serialize + Sync>(&self, path: &str, body: &T) -> Result<()> {
        let url = join(&self.base_url, path);
        debug!(url = %url, "Calling coordinator");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| send_error(&url, e))?;
        check_status(response).await?;
        Ok(())
    }
}

#[async_trait]
impl CoordinatorTransport for HttpCoordinatorTransport {
    async fn register(&self, request: &RegisterAgentRequest) -> Result<()> {
        self.post("/notify_agent", request).await
    }

    async fn report_result(&self, report: &BuildResultReport) -> Result<()> {
        self.post("/notify_build_result", report).await
    }
}
