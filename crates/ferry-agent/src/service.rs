//! The agent's build service: accepts dispatched builds, runs them and
//! reports the result.

use ferry_core::build::BuildOutcome;
use ferry_core::ids::BuildId;
use ferry_core::ports::CoordinatorTransport;
use ferry_core::protocol::{BuildCommand, BuildResultReport, HealthResponse};
use ferry_runner::{PipelinePhase, PipelineRunner};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

pub struct AgentService {
    runner: PipelineRunner,
    coordinator: Arc<dyn CoordinatorTransport>,
    report_timeout: Duration,
    current_build_tx: watch::Sender<Option<BuildId>>,
    current_build_rx: watch::Receiver<Option<BuildId>>,
}

impl AgentService {
    pub fn new(
        runner: PipelineRunner,
        coordinator: Arc<dyn CoordinatorTransport>,
        report_timeout: Duration,
    ) -> Self {
        let (current_build_tx, current_build_rx) = watch::channel(None);
        Self {
            runner,
            coordinator,
            report_timeout,
            current_build_tx,
            current_build_rx,
        }
    }

    pub fn current_build(&self) -> Option<BuildId> {
        *self.current_build_rx.borrow()
    }

    pub fn phase(&self) -> PipelinePhase {
        self.runner.phase()
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse::healthy(self.current_build()).with_phase(self.phase())
    }

    /// Start executing a dispatched build in the background. The caller's
    /// acknowledgement does not wait for the pipeline.
    ///
    /// The returned task supervises the build: if the build task dies
    /// without reporting, it clears the current build and reports a failure.
    pub fn accept(self: &Arc<Self>, command: BuildCommand) -> JoinHandle<()> {
        if let Some(running) = self.current_build() {
            warn!(
                running = %running,
                dispatched = %command.build_id,
                "Build dispatched while another is running"
            );
        }

        info!(
            build_id = %command.build_id,
            revision = %command.hash,
            command = %command.command,
            "Accepted build"
        );
        let build_id = command.build_id;
        self.current_build_tx.send_replace(Some(build_id));

        let service = Arc::clone(self);
        let work = tokio::spawn(async move { service.execute(command).await });

        let service = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = work.await {
                error!(build_id = %build_id, error = %e, "Build task ended abnormally");
                service.clear_current_build(build_id);
                service
                    .report(BuildResultReport {
                        build_id,
                        state: BuildOutcome::Failure,
                        stdout: String::new(),
                        stderr: format!("agent build task failed: {}", e),
                    })
                    .await;
            }
        })
    }

    async fn execute(&self, command: BuildCommand) {
        let build_id = command.build_id;
        let report = self.runner.run(&command).await.into_result_report();
        self.clear_current_build(build_id);
        self.report(report).await;
    }

    fn clear_current_build(&self, build_id: BuildId) {
        self.current_build_tx.send_if_modified(|current| {
            if *current == Some(build_id) {
                *current = None;
                true
            } else {
                false
            }
        });
    }

    async fn report(&self, report: BuildResultReport) {
        let build_id = report.build_id;
        info!(build_id = %build_id, state = %report.state, "Reporting build result");
        match timeout(self.report_timeout, self.coordinator.report_result(&report)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(build_id = %build_id, error = %e, "Failed to report build result");
            }
            Err(_) => {
                error!(
                    build_id = %build_id,
                    timeout_ms = self.report_timeout.as_millis() as u64,
                    "Timed out reporting build result"
                );
            }
        }
    }
}
