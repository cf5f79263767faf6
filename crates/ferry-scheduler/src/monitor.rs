//! Periodic liveness probing of registered agents.

use crate::scheduler::Scheduler;
use ferry_core::agent::AgentState;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, interval, timeout};
use tracing::{debug, info, warn};

/// Liveness monitor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Delay between probe rounds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Deadline for a single probe.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_enabled() -> bool {
    true
}

fn default_interval_ms() -> u64 {
    5000
}

fn default_timeout_ms() -> u64 {
    1000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            interval_ms: default_interval_ms(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Probes agents' liveness endpoints and records the outcome on each agent
/// record. It never changes an agent's scheduling state.
pub struct LivenessMonitor {
    scheduler: Arc<Scheduler>,
    config: MonitorConfig,
}

impl LivenessMonitor {
    pub fn new(scheduler: Arc<Scheduler>, config: MonitorConfig) -> Self {
        Self { scheduler, config }
    }

    /// Run probe rounds until shutdown.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(Duration::from_millis(self.config.interval_ms));

        info!(
            interval_ms = self.config.interval_ms,
            timeout_ms = self.config.timeout_ms,
            "Starting agent liveness monitor"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_all().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Liveness monitor shutting down");
                        break;
                    }
                }
            }
        }
    }

    /// Probe every agent that is not in ERROR once. Returns how many answered.
    pub async fn probe_all(&self) -> usize {
        let transport = self.scheduler.transport();
        let deadline = Duration::from_millis(self.config.timeout_ms);
        let mut reachable_count = 0;

        for agent in self.scheduler.agents().await {
            if agent.state == AgentState::Error {
                continue;
            }

            let reachable = match timeout(deadline, transport.probe(&agent.address)).await {
                Ok(Ok(health)) => {
                    debug!(agent = %agent.address, current_build = ?health.current_build, "Agent alive");
                    true
                }
                Ok(Err(e)) => {
                    warn!(agent = %agent.address, error = %e, "Agent liveness probe failed");
                    false
                }
                Err(_) => {
                    warn!(agent = %agent.address, timeout_ms = self.config.timeout_ms, "Agent liveness probe timed out");
                    false
                }
            };

            if reachable {
                reachable_count += 1;
            }
            self.scheduler.record_probe(agent.id, reachable).await;
        }

        reachable_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::SchedulerConfig;
    use async_trait::async_trait;
    use ferry_core::agent::AgentAddress;
    use ferry_core::ports::AgentTransport;
    use ferry_core::protocol::{BuildCommand, HealthResponse};
    use ferry_core::{Error, Result};

    /// Accepts every dispatch; only hosts named "up" answer probes.
    struct ProbeTransport;

    #[async_trait]
    impl AgentTransport for ProbeTransport {
        async fn dispatch(&self, _agent: &AgentAddress, _command: &BuildCommand) -> Result<()> {
            Ok(())
        }

        async fn probe(&self, agent: &AgentAddress) -> Result<HealthResponse> {
            if agent.host == "up" {
                Ok(HealthResponse::healthy(None))
            } else {
                Err(Error::Transport("connection refused".to_string()))
            }
        }
    }

    #[tokio::test]
    async fn test_probe_records_reachability_without_state_change() {
        let scheduler = Arc::new(Scheduler::new(
            SchedulerConfig::default(),
            Arc::new(ProbeTransport),
        ));
        scheduler.register_agent(AgentAddress::new("up", 1)).await;
        scheduler.register_agent(AgentAddress::new("down", 2)).await;

        let monitor = LivenessMonitor::new(scheduler.clone(), MonitorConfig::default());
        assert_eq!(monitor.probe_all().await, 1);

        let agents = scheduler.agents().await;
        assert_eq!(agents[0].reachable, Some(true));
        assert!(agents[0].last_seen_at.is_some());
        assert_eq!(agents[1].reachable, Some(false));
        assert_eq!(agents[1].state, AgentState::Pending);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let scheduler = Arc::new(Scheduler::new(
            SchedulerConfig::default(),
            Arc::new(ProbeTransport),
        ));
        let monitor = LivenessMonitor::new(
            scheduler,
            MonitorConfig {
                interval_ms: 10,
                ..Default::default()
            },
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move { monitor.run(rx).await });
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("monitor did not stop")
            .unwrap();
    }
}
