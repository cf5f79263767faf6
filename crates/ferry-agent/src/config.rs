//! Agent configuration.

use crate::registration::RegistrationConfig;
use ferry_core::agent::AgentAddress;
use ferry_core::{Error, Result};
use ferry_runner::RunnerConfig;
use ferry_trace::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Address the agent's HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Host name the coordinator should use to reach this agent.
    #[serde(default = "default_advertise_host")]
    pub advertise_host: String,
    /// Port announced at registration. Defaults to the bound listen port.
    #[serde(default)]
    pub advertise_port: Option<u16>,
    /// Base URL of the coordinator.
    #[serde(default = "default_coordinator_url")]
    pub coordinator_url: String,
    #[serde(default)]
    pub registration: RegistrationConfig,
    /// Deadline for delivering a build result to the coordinator.
    #[serde(default = "default_report_timeout_ms")]
    pub report_timeout_ms: u64,
    /// Workspace, stage templates and stage deadline.
    #[serde(flatten)]
    pub runner: RunnerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8081".to_string()
}

fn default_advertise_host() -> String {
    "localhost".to_string()
}

fn default_coordinator_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_report_timeout_ms() -> u64 {
    10_000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            advertise_host: default_advertise_host(),
            advertise_port: None,
            coordinator_url: default_coordinator_url(),
            registration: RegistrationConfig::default(),
            report_timeout_ms: default_report_timeout_ms(),
            runner: RunnerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl AgentConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// The address announced to the coordinator, given the port actually bound.
    pub fn advertise_address(&self, bound_port: u16) -> AgentAddress {
        AgentAddress::new(
            self.advertise_host.clone(),
            self.advertise_port.unwrap_or(bound_port),
        )
    }

    pub fn report_timeout(&self) -> Duration {
        Duration::from_millis(self.report_timeout_ms)
    }
}
