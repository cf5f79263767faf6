//! Agent types.

use crate::ids::AgentId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Network address of an agent. Two registrations are the same agent iff
/// their addresses are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentAddress {
    pub host: String,
    pub port: u16,
}

impl AgentAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL of the agent's HTTP service.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for AgentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: AgentId,
    #[serde(flatten)]
    pub address: AgentAddress,
    pub state: AgentState,
    pub registered_at: DateTime<Utc>,
    /// Last successful liveness probe.
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Outcome of the most recent liveness probe, if any ran.
    pub reachable: Option<bool>,
}

impl Agent {
    pub fn new(id: AgentId, address: AgentAddress) -> Self {
        Self {
            id,
            address,
            state: AgentState::Pending,
            registered_at: Utc::now(),
            last_seen_at: None,
            reachable: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state.is_available()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AgentState {
    /// Idle and available for dispatch.
    Pending,
    /// Holding exactly one active build.
    Building,
    /// A dispatch to this agent failed at the transport level.
    Error,
}

impl AgentState {
    pub fn is_available(&self) -> bool {
        matches!(self, AgentState::Pending)
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentState::Pending => write!(f, "pending"),
            AgentState::Building => write!(f, "building"),
            AgentState::Error => write!(f, "error"),
        }
    }
}

/// Where a pipeline run currently is.
///
/// Stage phases only move forward (`Acquiring → Fetching → CheckingOut →
/// Installing → Running`), possibly skipping stages a plan leaves out. Any
/// active phase may end in `Succeeded` or `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PipelinePhase {
    Idle,
    Acquiring,
    Fetching,
    CheckingOut,
    Installing,
    Running,
    Succeeded,
    Failed,
}

impl PipelinePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelinePhase::Succeeded | PipelinePhase::Failed)
    }

    fn stage_rank(&self) -> Option<u8> {
        match self {
            PipelinePhase::Acquiring => Some(0),
            PipelinePhase::Fetching => Some(1),
            PipelinePhase::CheckingOut => Some(2),
            PipelinePhase::Installing => Some(3),
            PipelinePhase::Running => Some(4),
            PipelinePhase::Idle | PipelinePhase::Succeeded | PipelinePhase::Failed => None,
        }
    }

    /// Whether `next` is a legal successor of this phase.
    pub fn can_transition_to(&self, next: PipelinePhase) -> bool {
        use PipelinePhase::*;
        match (self.stage_rank(), next.stage_rank()) {
            (None, _) => next == Acquiring,
            (Some(_), None) => next.is_terminal(),
            (Some(from), Some(to)) => to > from,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_base_url() {
        let addr = AgentAddress::new("localhost", 8081);
        assert_eq!(addr.base_url(), "http://localhost:8081");
        assert_eq!(addr.to_string(), "localhost:8081");
    }

    #[test]
    fn test_agent_serializes_flat_address() {
        let agent = Agent::new(AgentId::new(0), AgentAddress::new("h1", 9000));
        let value = serde_json::to_value(&agent).unwrap();
        assert_eq!(value["host"], "h1");
        assert_eq!(value["port"], 9000);
        assert_eq!(value["state"], "pending");
    }

    #[test]
    fn test_phase_transitions() {
        use PipelinePhase::*;
        let happy = [Idle, Acquiring, Fetching, CheckingOut, Installing, Running, Succeeded];
        for pair in happy.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
        assert!(Fetching.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Acquiring));
        assert!(!Failed.can_transition_to(Succeeded));
        assert!(!Running.can_transition_to(Acquiring));
        assert!(!Installing.can_transition_to(Fetching));
        assert!(!Idle.can_transition_to(Running));
        assert!(Succeeded.is_terminal());
    }

    #[test]
    fn test_phase_may_skip_stages_left_out_of_a_plan() {
        use PipelinePhase::*;
        assert!(Acquiring.can_transition_to(Running));
        assert!(Fetching.can_transition_to(Installing));
        assert!(Installing.can_transition_to(Succeeded));
        assert!(Acquiring.can_transition_to(Failed));
    }
}
