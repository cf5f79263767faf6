//! Test helper functions and utilities.

use ferry_agent::{AgentConfig, AgentService, BuildAgent};
use ferry_api::{Coordinator, CoordinatorConfig};
use ferry_core::agent::AgentState;
use ferry_core::build::{Build, BuildState};
use ferry_core::protocol::{AgentListResponse, StatusResponse, SubmitBuildResponse};
use ferry_core::{BuildId, Error};
use ferry_scheduler::Scheduler;
use reqwest::Client;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A coordinator serving on a loopback port.
pub struct TestCoordinator {
    pub addr: SocketAddr,
    pub scheduler: Arc<Scheduler>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<ferry_core::Result<()>>,
}

impl TestCoordinator {
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.handle.await;
    }
}

/// Start a coordinator and return once it is accepting connections.
pub async fn start_coordinator(config: CoordinatorConfig) -> anyhow::Result<TestCoordinator> {
    let listener = TcpListener::bind(&config.listen_addr).await?;
    let addr = listener.local_addr()?;
    let coordinator = Coordinator::new(config)?;
    let scheduler = coordinator.scheduler();

    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(coordinator.run(listener, shutdown_rx));

    Ok(TestCoordinator {
        addr,
        scheduler,
        shutdown,
        handle,
    })
}

/// An agent serving on a loopback port.
pub struct TestAgent {
    pub addr: SocketAddr,
    pub service: Arc<AgentService>,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<ferry_core::Result<()>>,
}

impl TestAgent {
    pub async fn stop(self) -> ferry_core::Result<()> {
        let _ = self.shutdown.send(true);
        self.handle
            .await
            .map_err(|e| Error::Internal(e.to_string()))?
    }

    /// Wait for the agent task to end by itself, e.g. after registration fails.
    pub async fn join(self) -> ferry_core::Result<()> {
        self.handle
            .await
            .map_err(|e| Error::Internal(e.to_string()))?
    }
}

/// Start an agent. Registration runs in the background; use
/// [`ApiTestClient::wait_for_agents`] to wait for it.
pub async fn start_agent(config: AgentConfig) -> anyhow::Result<TestAgent> {
    let listener = TcpListener::bind(&config.listen_addr).await?;
    let addr = listener.local_addr()?;
    let agent = BuildAgent::new(config)?;
    let service = agent.service();

    let (shutdown, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(agent.run(listener, shutdown_rx));

    Ok(TestAgent {
        addr,
        service,
        shutdown,
        handle,
    })
}

/// A loopback address with nothing listening on it.
pub async fn unused_addr() -> anyhow::Result<SocketAddr> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?)
}

/// Create an HTTP client for testing.
pub fn test_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create test client")
}

/// Coordinator API client with base URL.
pub struct ApiTestClient {
    client: Client,
    base_url: String,
}

impl ApiTestClient {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            client: test_client(),
            base_url: format!("http://{}", addr),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn get(&self, path: &str) -> reqwest::Result<reqwest::Response> {
        self.client.get(self.url(path)).send().await
    }

    pub async fn post<T: serde::Serialize>(
        &self,
        path: &str,
        body: &T,
    ) -> reqwest::Result<reqwest::Response> {
        self.client.post(self.url(path)).json(body).send().await
    }

    /// Check health endpoint.
    pub async fn health(&self) -> anyhow::Result<bool> {
        let resp = self.get("/health").await?;
        Ok(resp.status().is_success())
    }

    pub async fn submit(&self, revision: &str, command: &str) -> anyhow::Result<BuildId> {
        let resp = self
            .post("/", &json!({"revision": revision, "command": command}))
            .await?
            .error_for_status()?;
        let body: SubmitBuildResponse = resp.json().await?;
        Ok(body.build_id)
    }

    pub async fn register(&self, addr: SocketAddr) -> anyhow::Result<reqwest::StatusCode> {
        let resp = self
            .post(
                "/notify_agent",
                &json!({"host": addr.ip().to_string(), "port": addr.port()}),
            )
            .await?;
        Ok(resp.status())
    }

    pub async fn builds(&self) -> anyhow::Result<Vec<Build>> {
        let body: StatusResponse = self.get("/status").await?.json().await?;
        Ok(body.builds)
    }

    pub async fn build(&self, id: BuildId) -> anyhow::Result<Build> {
        let resp = self
            .get(&format!("/builds/{}", id.get()))
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }

    pub async fn agents(&self) -> anyhow::Result<AgentListResponse> {
        Ok(self.get("/agents").await?.json().await?)
    }

    /// Poll until `count` agents are registered.
    pub async fn wait_for_agents(&self, count: usize, timeout: Duration) -> bool {
        wait_for(timeout, Duration::from_millis(20), move || async move {
            self.agents()
                .await
                .map(|list| list.agents.len() >= count)
                .unwrap_or(false)
        })
        .await
    }

    /// Poll until the build reaches a terminal state and return it.
    pub async fn wait_for_completion(&self, id: BuildId, timeout: Duration) -> Option<Build> {
        let done = wait_for(timeout, Duration::from_millis(20), move || async move {
            self.build(id)
                .await
                .map(|b| b.state.is_terminal())
                .unwrap_or(false)
        })
        .await;
        if done { self.build(id).await.ok() } else { None }
    }

    /// Poll until the agent at `index` is in `state`.
    pub async fn wait_for_agent_state(
        &self,
        index: usize,
        state: AgentState,
        timeout: Duration,
    ) -> bool {
        wait_for(timeout, Duration::from_millis(20), move || async move {
            self.agents()
                .await
                .map(|list| list.agents.get(index).map(|a| a.state) == Some(state))
                .unwrap_or(false)
        })
        .await
    }

    pub async fn build_state(&self, id: BuildId) -> anyhow::Result<BuildState> {
        Ok(self.build(id).await?.state)
    }
}

/// Wait for a condition with timeout.
pub async fn wait_for<F, Fut>(timeout: Duration, interval: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    false
}

/// Assert that a future completes within a timeout.
pub async fn assert_completes_within<F, T>(future: F, timeout: Duration) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(timeout, future)
        .await
        .expect("Operation timed out")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_for_immediate() {
        let result = wait_for(Duration::from_secs(1), Duration::from_millis(10), || async {
            true
        })
        .await;
        assert!(result);
    }

    #[tokio::test]
    async fn test_wait_for_timeout() {
        let result = wait_for(
            Duration::from_millis(100),
            Duration::from_millis(10),
            || async { false },
        )
        .await;
        assert!(!result);
    }
}
