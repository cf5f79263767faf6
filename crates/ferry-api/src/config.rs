//! Coordinator configuration.

use ferry_core::{Error, Result};
use ferry_scheduler::{MonitorConfig, RegistrationPolicy, SchedulerConfig};
use ferry_trace::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Coordinator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Address the HTTP server binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Repository location sent to agents with every dispatch.
    #[serde(default = "default_source_location")]
    pub source_location: String,
    /// Deadline for an agent to acknowledge a dispatch.
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,
    #[serde(default)]
    pub registration_policy: RegistrationPolicy,
    #[serde(default)]
    pub liveness: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_source_location() -> String {
    ".".to_string()
}

fn default_dispatch_timeout_ms() -> u64 {
    10_000
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            source_location: default_source_location(),
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            registration_policy: RegistrationPolicy::default(),
            liveness: MonitorConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        serde_yaml::from_str(contents).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            source_location: self.source_location.clone(),
            registration_policy: self.registration_policy,
        }
    }
}
