//! Core runner types: output chunks, the accumulating build output and
//! stage failures.

use crate::stage::{StageCommands, StageKind};
use ferry_core::build::BuildOutcome;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Output stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

impl fmt::Display for OutputStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputStream::Stdout => f.write_str("STDOUT"),
            OutputStream::Stderr => f.write_str("STDERR"),
        }
    }
}

/// A chunk of output as it was read from a child process.
#[derive(Debug, Clone)]
pub struct OutputChunk {
    pub stage: StageKind,
    pub stream: OutputStream,
    pub content: String,
}

/// Output accumulated across every stage that ran, plus the exit code of
/// the last one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl BuildOutput {
    pub fn append(&mut self, stream: OutputStream, text: &str) {
        match stream {
            OutputStream::Stdout => self.stdout.push_str(text),
            OutputStream::Stderr => self.stderr.push_str(text),
        }
    }

    /// Append a synthesized message to stderr on its own line.
    pub fn append_error(&mut self, message: &str) {
        if !self.stderr.is_empty() && !self.stderr.ends_with('\n') {
            self.stderr.push('\n');
        }
        self.stderr.push_str(message);
        self.stderr.push('\n');
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }

    pub fn outcome(&self) -> BuildOutcome {
        BuildOutcome::from_exit_code(self.exit_code)
    }
}

/// Why a stage failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The process ran and exited with a non-zero code (or was killed by a signal).
    ExitCode(i32),
    /// The process could not be started.
    Launch(String),
    /// The stage exceeded its deadline and was killed.
    TimedOut(Duration),
    /// The workspace could not be created.
    Workspace(String),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::ExitCode(code) => write!(f, "exited with code {}", code),
            FailureCause::Launch(msg) => write!(f, "failed to launch: {}", msg),
            FailureCause::TimedOut(after) => {
                write!(f, "timed out after {} ms", after.as_millis())
            }
            FailureCause::Workspace(msg) => write!(f, "workspace unavailable: {}", msg),
        }
    }
}

/// The stage that stopped a pipeline and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub stage: StageKind,
    pub cause: FailureCause,
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.stage, self.cause)
    }
}

/// Configuration for pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Command templates for fetch, checkout and install.
    #[serde(default)]
    pub stages: StageCommands,
    /// Directory under which per-build workspaces are created. Defaults to
    /// the system temp directory.
    #[serde(default)]
    pub workspace_root: Option<PathBuf>,
    /// Leave the workspace on disk after the run.
    #[serde(default = "default_keep_workspace")]
    pub keep_workspace: bool,
    /// Per-stage deadline; absent means stages may run indefinitely.
    #[serde(default)]
    pub stage_timeout_ms: Option<u64>,
}

fn default_keep_workspace() -> bool {
    true
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            stages: StageCommands::default(),
            workspace_root: None,
            keep_workspace: default_keep_workspace(),
            stage_timeout_ms: None,
        }
    }
}

impl RunnerConfig {
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_ms.map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_appends_across_stages() {
        let mut output = BuildOutput::default();
        output.append(OutputStream::Stdout, "cloned\n");
        output.append(OutputStream::Stdout, "installed\n");
        output.append(OutputStream::Stderr, "warn");
        output.append_error("launch failed");

        assert_eq!(output.stdout, "cloned\ninstalled\n");
        assert_eq!(output.stderr, "warn\nlaunch failed\n");
    }

    #[test]
    fn test_outcome_follows_exit_code() {
        let mut output = BuildOutput::default();
        assert_eq!(output.outcome(), BuildOutcome::Success);
        output.exit_code = 2;
        assert!(!output.succeeded());
        assert_eq!(output.outcome(), BuildOutcome::Failure);
    }

    #[test]
    fn test_config_defaults_from_empty_yaml() {
        let config: RunnerConfig = serde_yaml::from_str("{}").unwrap();
        assert!(config.keep_workspace);
        assert_eq!(config.stage_timeout(), None);
        assert_eq!(config.stages, StageCommands::default());
    }
}
