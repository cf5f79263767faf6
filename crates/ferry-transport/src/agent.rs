//! Coordinator → agent calls.

use crate::client::{TransportConfig, check_status, join, read_json, send_error};
use async_trait::async_trait;
use ferry_core::Result;
use ferry_core::agent::AgentAddress;
use ferry_core::ports::AgentTransport;
use ferry_core::protocol::{BuildCommand, HealthResponse};
use reqwest::Client;
use tracing::debug;

/// Dispatches builds to agents and probes their liveness endpoint.
pub struct HttpAgentTransport {
    client: Client,
}

impl HttpAgentTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        Ok(Self {
            client: config.build_client()?,
        })
    }
}

#[async_trait]
impl AgentTransport for HttpAgentTransport {
    async fn dispatch(&self, agent: &AgentAddress, command: &BuildCommand) -> Result<()> {
        let url = join(&agent.base_url(), "/build");
        debug!(url = %url, build_id = %command.build_id, "Dispatching build");

        let response = self
            .client
            .post(&url)
            .json(command)
            .send()
            .await
            .map_err(|e| send_error(&url, e))?;
        check_status(response).await?;
        Ok(())
    }

    async fn probe(&self, agent: &AgentAddress) -> Result<HealthResponse> {
        let url = join(&agent.base_url(), "/health");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| send_error(&url, e))?;
        let response = check_status(response).await?;
        read_json(&url, response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::Error;
    use ferry_core::ids::BuildId;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn address_of(server: &MockServer) -> AgentAddress {
        let addr = server.address();
        AgentAddress::new(addr.ip().to_string(), addr.port())
    }

    fn command() -> BuildCommand {
        BuildCommand {
            build_id: BuildId::new(4),
            path: "/srv/repo".to_string(),
            hash: "abc123".to_string(),
            command: "npm test".to_string(),
        }
    }

    #[tokio::test]
    async fn test_dispatch_posts_build_command() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/build"))
            .and(body_json(serde_json::json!({
                "buildId": 4,
                "path": "/srv/repo",
                "hash": "abc123",
                "command": "npm test"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpAgentTransport::new(&TransportConfig::default()).unwrap();
        transport
            .dispatch(&address_of(&server), &command())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_rejected_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/build"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let transport = HttpAgentTransport::new(&TransportConfig::default()).unwrap();
        let err = transport
            .dispatch(&address_of(&server), &command())
            .await
            .unwrap_err();

        match err {
            Error::Rejected { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "busy");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_timeout_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/build"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let transport = HttpAgentTransport::new(&TransportConfig::with_request_timeout(
            Duration::from_millis(100),
        ))
        .unwrap();
        let err = transport
            .dispatch(&address_of(&server), &command())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_dispatch_unreachable_agent() {
        let transport = HttpAgentTransport::new(&TransportConfig::default()).unwrap();
        // Port 1 on loopback is reserved and refuses connections.
        let err = transport
            .dispatch(&AgentAddress::new("127.0.0.1", 1), &command())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_probe_reads_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "healthy",
                "version": "0.1.0",
                "currentBuild": 9
            })))
            .mount(&server)
            .await;

        let transport = HttpAgentTransport::new(&TransportConfig::default()).unwrap();
        let health = transport.probe(&address_of(&server)).await.unwrap();

        assert_eq!(health.status, "healthy");
        assert_eq!(health.current_build, Some(BuildId::new(9)));
    }
}
