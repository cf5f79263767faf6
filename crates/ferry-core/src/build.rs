//! Build types.

use crate::ids::BuildId;
use chrono::{DateTime, Utc};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

/// One requested unit of work: fetch a revision, install dependencies, run a command.
///
/// Serialized with the revision under both `revision` and `hash`; status
/// dashboards read the latter.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: BuildId,
    pub revision: String,
    pub command: String,
    pub state: BuildState,
    pub stdout: String,
    pub stderr: String,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Build {
    /// A freshly queued build with empty output.
    pub fn new(id: BuildId, revision: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            id,
            revision: revision.into(),
            command: command.into(),
            state: BuildState::Pending,
            stdout: String::new(),
            stderr: String::new(),
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == BuildState::Pending
    }

    pub fn duration_ms(&self) -> Option<u64> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        Some((completed - started).num_milliseconds().max(0) as u64)
    }
}

impl Serialize for Build {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Build", 10)?;
        state.serialize_field("id", &self.id)?;
        state.serialize_field("revision", &self.revision)?;
        state.serialize_field("hash", &self.revision)?;
        state.serialize_field("command", &self.command)?;
        state.serialize_field("state", &self.state)?;
        state.serialize_field("stdout", &self.stdout)?;
        state.serialize_field("stderr", &self.stderr)?;
        state.serialize_field("queuedAt", &self.queued_at)?;
        state.serialize_field("startedAt", &self.started_at)?;
        state.serialize_field("completedAt", &self.completed_at)?;
        state.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildState {
    Pending,
    InProgress,
    Success,
    Failure,
}

impl BuildState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Success | BuildState::Failure)
    }
}

impl std::fmt::Display for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildState::Pending => write!(f, "pending"),
            BuildState::InProgress => write!(f, "inProgress"),
            BuildState::Success => write!(f, "success"),
            BuildState::Failure => write!(f, "failure"),
        }
    }
}

/// Terminal classification of a finished pipeline. Only these two states
/// can be reported back to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildOutcome {
    Success,
    Failure,
}

impl BuildOutcome {
    /// Classify a terminal exit code: zero is success, anything else is failure.
    pub fn from_exit_code(exit_code: i32) -> Self {
        if exit_code == 0 {
            BuildOutcome::Success
        } else {
            BuildOutcome::Failure
        }
    }
}

impl From<BuildOutcome> for BuildState {
    fn from(outcome: BuildOutcome) -> Self {
        match outcome {
            BuildOutcome::Success => BuildState::Success,
            BuildOutcome::Failure => BuildState::Failure,
        }
    }
}

impl std::fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        BuildState::from(*self).fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_build_is_pending_with_empty_output() {
        let build = Build::new(BuildId::new(0), "abc123", "npm test");
        assert!(build.is_pending());
        assert!(build.stdout.is_empty());
        assert!(build.stderr.is_empty());
        assert_eq!(build.duration_ms(), None);
    }

    #[test]
    fn test_state_wire_names() {
        assert_eq!(
            serde_json::to_string(&BuildState::InProgress).unwrap(),
            "\"inProgress\""
        );
        let state: BuildState = serde_json::from_str("\"failure\"").unwrap();
        assert_eq!(state, BuildState::Failure);
    }

    #[test]
    fn test_outcome_from_exit_code() {
        assert_eq!(BuildOutcome::from_exit_code(0), BuildOutcome::Success);
        assert_eq!(BuildOutcome::from_exit_code(1), BuildOutcome::Failure);
        assert_eq!(BuildOutcome::from_exit_code(-1), BuildOutcome::Failure);
        assert!(BuildState::from(BuildOutcome::Failure).is_terminal());
    }

    #[test]
    fn test_outcome_rejects_non_terminal_state() {
        let parsed: Result<BuildOutcome, _> = serde_json::from_str("\"pending\"");
        assert!(parsed.is_err());
    }
}
