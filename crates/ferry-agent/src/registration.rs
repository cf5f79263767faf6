//! Startup registration with the coordinator.

use ferry_core::agent::AgentAddress;
use ferry_core::ports::CoordinatorTransport;
use ferry_core::protocol::RegisterAgentRequest;
use ferry_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::{Duration, sleep};
use tracing::{error, info, warn};

/// Retry policy for registration: a fixed number of attempts with a fixed
/// delay between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_retry_delay_ms() -> u64 {
    3000
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

/// Where a registration attempt sequence stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Unregistered,
    /// `attempts` calls have failed so far; another will follow.
    Retrying { attempts: u32 },
    Registered { attempts: u32 },
    Failed { attempts: u32 },
}

/// Drives registration attempts until one succeeds or the attempt budget is
/// spent.
pub struct Registrar {
    transport: Arc<dyn CoordinatorTransport>,
    request: RegisterAgentRequest,
    config: RegistrationConfig,
    state: RegistrationState,
}

impl Registrar {
    pub fn new(
        transport: Arc<dyn CoordinatorTransport>,
        address: &AgentAddress,
        config: RegistrationConfig,
    ) -> Self {
        Self {
            transport,
            request: RegisterAgentRequest::from(address),
            config,
            state: RegistrationState::Unregistered,
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    fn attempts(&self) -> u32 {
        match self.state {
            RegistrationState::Unregistered => 0,
            RegistrationState::Retrying { attempts }
            | RegistrationState::Registered { attempts }
            | RegistrationState::Failed { attempts } => attempts,
        }
    }

    /// Make one attempt and advance the state machine.
    pub async fn attempt(&mut self) -> RegistrationState {
        let attempts = self.attempts() + 1;

        info!(
            host = %self.request.host,
            port = self.request.port,
            attempt = attempts,
            max_attempts = self.config.max_attempts,
            "Registering with coordinator"
        );

        self.state = match self.transport.register(&self.request).await {
            Ok(()) => RegistrationState::Registered { attempts },
            Err(e) if attempts >= self.config.max_attempts => {
                error!(error = %e, attempts, "Registration failed, giving up");
                RegistrationState::Failed { attempts }
            }
            Err(e) => {
                warn!(
                    error = %e,
                    attempt = attempts,
                    retry_delay_ms = self.config.retry_delay_ms,
                    "Registration attempt failed, will retry"
                );
                RegistrationState::Retrying { attempts }
            }
        };
        self.state
    }

    /// Attempt until registered or out of attempts. Returns how many
    /// attempts it took.
    pub async fn run(mut self) -> Result<u32> {
        loop {
            match self.attempt().await {
                RegistrationState::Registered { attempts } => {
                    info!(attempts, "Registered with coordinator");
                    return Ok(attempts);
                }
                RegistrationState::Failed { attempts } => {
                    return Err(Error::RegistrationFailed { attempts });
                }
                RegistrationState::Retrying { .. } | RegistrationState::Unregistered => {
                    sleep(Duration::from_millis(self.config.retry_delay_ms)).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferry_core::protocol::BuildResultReport;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Refuses the first `failures` registrations.
    struct FlakyCoordinator {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyCoordinator {
        fn new(failures: u32) -> Arc<Self> {
            Arc::new(Self {
                failures,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl CoordinatorTransport for FlakyCoordinator {
        async fn register(&self, _request: &RegisterAgentRequest) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                Err(Error::Transport("connection refused".to_string()))
            } else {
                Ok(())
            }
        }

        async fn report_result(&self, _report: &BuildResultReport) -> Result<()> {
            Ok(())
        }
    }

    fn fast() -> RegistrationConfig {
        RegistrationConfig {
            max_attempts: 5,
            retry_delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_registers_first_try() {
        let coordinator = FlakyCoordinator::new(0);
        let registrar = Registrar::new(coordinator.clone(), &AgentAddress::new("h", 1), fast());
        assert_eq!(registrar.run().await.unwrap(), 1);
        assert_eq!(coordinator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let coordinator = FlakyCoordinator::new(4);
        let registrar = Registrar::new(coordinator.clone(), &AgentAddress::new("h", 1), fast());
        assert_eq!(registrar.run().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let coordinator = FlakyCoordinator::new(u32::MAX);
        let registrar = Registrar::new(coordinator.clone(), &AgentAddress::new("h", 1), fast());

        let err = registrar.run().await.unwrap_err();

        assert!(matches!(err, Error::RegistrationFailed { attempts: 5 }));
        assert_eq!(coordinator.calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_state_transitions() {
        let coordinator = FlakyCoordinator::new(1);
        let mut registrar = Registrar::new(
            coordinator,
            &AgentAddress::new("h", 1),
            RegistrationConfig {
                max_attempts: 2,
                retry_delay_ms: 1,
            },
        );

        assert_eq!(registrar.state(), RegistrationState::Unregistered);
        assert_eq!(
            registrar.attempt().await,
            RegistrationState::Retrying { attempts: 1 }
        );
        assert_eq!(
            registrar.attempt().await,
            RegistrationState::Registered { attempts: 2 }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_fixed_delay_between_attempts() {
        let coordinator = FlakyCoordinator::new(2);
        let registrar = Registrar::new(
            coordinator,
            &AgentAddress::new("h", 1),
            RegistrationConfig::default(),
        );
        let started = tokio::time::Instant::now();

        assert_eq!(registrar.run().await.unwrap(), 3);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(6000), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(9000), "{:?}", elapsed);
    }
}
