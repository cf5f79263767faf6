//! Test fixtures: a source tree to build and service configurations.

use ferry_agent::{AgentConfig, RegistrationConfig};
use ferry_api::CoordinatorConfig;
use ferry_runner::{RunnerConfig, StageCommands};
use ferry_scheduler::MonitorConfig;
use std::net::SocketAddr;
use std::path::Path;
use tempfile::TempDir;

/// A throwaway source tree that the fetch stage copies into each workspace.
pub struct SourceFixture {
    dir: TempDir,
}

impl SourceFixture {
    /// A tree with a passing and a failing build script.
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        std::fs::write(dir.path().join("README"), "fixture source tree\n")?;
        std::fs::write(dir.path().join("pass.sh"), "echo building; echo tests passed\n")?;
        std::fs::write(dir.path().join("fail.sh"), "printf boom >&2\nexit 1\n")?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn location(&self) -> String {
        self.dir.path().display().to_string()
    }
}

/// Coordinator on an ephemeral port with the liveness monitor off.
pub fn coordinator_config(source_location: impl Into<String>) -> CoordinatorConfig {
    CoordinatorConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        source_location: source_location.into(),
        dispatch_timeout_ms: 2_000,
        liveness: MonitorConfig {
            enabled: false,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Stage templates that need only a POSIX shell: copy the source tree in,
/// echo the revision and skip dependency installation.
pub fn shell_stages() -> StageCommands {
    StageCommands {
        fetch: "cp -R {source}/. .".to_string(),
        checkout: "echo checkout {revision}".to_string(),
        install: "true".to_string(),
    }
}

/// Agent on an ephemeral loopback port that registers with `coordinator`.
pub fn agent_config(coordinator: SocketAddr, workspace_root: &Path) -> AgentConfig {
    AgentConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        advertise_host: "127.0.0.1".to_string(),
        coordinator_url: format!("http://{}", coordinator),
        registration: RegistrationConfig {
            max_attempts: 5,
            retry_delay_ms: 50,
        },
        report_timeout_ms: 5_000,
        runner: RunnerConfig {
            stages: shell_stages(),
            workspace_root: Some(workspace_root.to_path_buf()),
            keep_workspace: false,
            stage_timeout_ms: Some(30_000),
        },
        ..Default::default()
    }
}
