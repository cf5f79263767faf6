//! Wire schemas for the coordinator/agent RPC surface.
//!
//! Field names follow the camelCase JSON convention shared by the
//! coordinator, agents and the dashboard. Payloads that reach core logic
//! are validated here first.

use crate::agent::{Agent, AgentAddress, PipelinePhase};
use crate::build::{Build, BuildOutcome};
use crate::ids::BuildId;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Client → coordinator: queue a build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitBuildRequest {
    #[serde(alias = "hash")]
    pub revision: String,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitBuildResponse {
    pub build_id: BuildId,
}

/// Coordinator → client: every known build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub builds: Vec<Build>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentListResponse {
    pub agents: Vec<Agent>,
}

/// Agent → coordinator: announce the agent's own address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterAgentRequest {
    pub host: String,
    pub port: u16,
}

impl RegisterAgentRequest {
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::InvalidPayload("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(Error::InvalidPayload("port must not be zero".to_string()));
        }
        Ok(())
    }

    pub fn address(&self) -> AgentAddress {
        AgentAddress::new(self.host.clone(), self.port)
    }
}

impl From<&AgentAddress> for RegisterAgentRequest {
    fn from(address: &AgentAddress) -> Self {
        Self {
            host: address.host.clone(),
            port: address.port,
        }
    }
}

/// Coordinator → agent: start a build. `path` is the source location and
/// `hash` the revision to check out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildCommand {
    pub build_id: BuildId,
    pub path: String,
    pub hash: String,
    pub command: String,
}

impl BuildCommand {
    pub fn for_build(build: &Build, source_location: &str) -> Self {
        Self {
            build_id: build.id,
            path: source_location.to_string(),
            hash: build.revision.clone(),
            command: build.command.clone(),
        }
    }
}

/// Agent → coordinator: the classified result of a finished pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResultReport {
    #[serde(alias = "id")]
    pub build_id: BuildId,
    pub state: BuildOutcome,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

/// Liveness response served by both processes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_build: Option<BuildId>,
    /// Pipeline phase; agents only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PipelinePhase>,
}

impl HealthResponse {
    pub fn healthy(current_build: Option<BuildId>) -> Self {
        Self {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            current_build,
            phase: None,
        }
    }

    pub fn with_phase(mut self, phase: PipelinePhase) -> Self {
        self.phase = Some(phase);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_submit_accepts_hash_alias() {
        let req: SubmitBuildRequest =
            serde_json::from_str(r#"{"hash":"abc123","command":"npm test"}"#).unwrap();
        assert_eq!(req.revision, "abc123");
        assert_eq!(req.command, "npm test");
    }

    #[test]
    fn test_build_command_wire_shape() {
        let build = Build::new(BuildId::new(3), "r1", "npm test");
        let cmd = BuildCommand::for_build(&build, "/srv/repo");
        let value = serde_json::to_value(&cmd).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "buildId": 3,
                "path": "/srv/repo",
                "hash": "r1",
                "command": "npm test",
            })
        );
    }

    #[test]
    fn test_result_report_accepts_id_alias() {
        let report: BuildResultReport = serde_json::from_str(
            r#"{"id":2,"state":"failure","stdout":"","stderr":"boom"}"#,
        )
        .unwrap();
        assert_eq!(report.build_id, BuildId::new(2));
        assert_eq!(report.state, BuildOutcome::Failure);
        assert_eq!(report.stderr, "boom");
    }

    #[test]
    fn test_result_report_rejects_in_progress_state() {
        let parsed: std::result::Result<BuildResultReport, _> =
            serde_json::from_str(r#"{"buildId":2,"state":"inProgress"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_register_validation() {
        let ok = RegisterAgentRequest {
            host: "localhost".to_string(),
            port: 8081,
        };
        assert!(ok.validate().is_ok());

        let empty_host = RegisterAgentRequest {
            host: " ".to_string(),
            port: 8081,
        };
        assert!(matches!(
            empty_host.validate(),
            Err(Error::InvalidPayload(_))
        ));

        let zero_port = RegisterAgentRequest {
            host: "localhost".to_string(),
            port: 0,
        };
        assert!(zero_port.validate().is_err());
    }

    #[test]
    fn test_health_omits_missing_build() {
        let json = serde_json::to_value(HealthResponse::healthy(None)).unwrap();
        assert!(json.get("currentBuild").is_none());
        assert!(json.get("phase").is_none());
        assert_eq!(json["status"], "healthy");
    }

    #[test]
    fn test_agent_health_carries_phase() {
        let health = HealthResponse::healthy(Some(BuildId::new(4))).with_phase(PipelinePhase::CheckingOut);
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["currentBuild"], 4);
        assert_eq!(json["phase"], "checkingOut");

        let parsed: HealthResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.phase, Some(PipelinePhase::CheckingOut));
    }
}
