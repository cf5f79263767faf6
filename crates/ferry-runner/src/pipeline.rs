//! The build pipeline driver.

use crate::process::run_stage;
use crate::runner::{BuildOutput, FailureCause, RunnerConfig, StageFailure};
use crate::stage::{PipelinePlan, StageKind};
use crate::workspace::Workspace;
use ferry_core::agent::PipelinePhase;
use ferry_core::build::BuildOutcome;
use ferry_core::ids::BuildId;
use ferry_core::protocol::{BuildCommand, BuildResultReport};
use ferry_trace::{build_span, stage_span};
use std::path::PathBuf;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{Instrument, error, info, warn};

/// Timing and exit code of one stage that ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub kind: StageKind,
    pub exit_code: i32,
    pub duration_ms: u64,
}

/// Everything a finished pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub build_id: BuildId,
    pub output: BuildOutput,
    pub stages: Vec<StageReport>,
    pub failure: Option<StageFailure>,
    /// Workspace left on disk, if it was kept.
    pub workspace: Option<PathBuf>,
}

impl PipelineReport {
    pub fn outcome(&self) -> BuildOutcome {
        self.output.outcome()
    }

    pub fn into_result_report(self) -> BuildResultReport {
        BuildResultReport {
            build_id: self.build_id,
            state: self.output.outcome(),
            stdout: self.output.stdout,
            stderr: self.output.stderr,
        }
    }
}

/// Runs builds through acquire, fetch, checkout, install and run, stopping
/// at the first stage that fails.
pub struct PipelineRunner {
    config: RunnerConfig,
    phase: watch::Sender<PipelinePhase>,
}

impl PipelineRunner {
    pub fn new(config: RunnerConfig) -> Self {
        let (phase, _) = watch::channel(PipelinePhase::Idle);
        Self {
            config,
            phase,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn phase(&self) -> PipelinePhase {
        *self.phase.borrow()
    }

    /// Run the standard plan for a dispatched build.
    pub async fn run(&self, command: &BuildCommand) -> PipelineReport {
        let plan = PipelinePlan::for_command(&self.config.stages, command);
        self.run_plan(command.build_id, plan).await
    }

    /// Acquire a workspace, then fold `plan` over the accumulated output.
    pub async fn run_plan(&self, build_id: BuildId, plan: PipelinePlan) -> PipelineReport {
        self.drive(build_id, plan)
            .instrument(build_span(build_id))
            .await
    }

    async fn drive(&self, build_id: BuildId, plan: PipelinePlan) -> PipelineReport {
        let mut report = PipelineReport {
            build_id,
            output: BuildOutput::default(),
            stages: Vec::new(),
            failure: None,
            workspace: None,
        };

        self.set_phase(PipelinePhase::Acquiring);
        let started = Instant::now();
        let workspace = match Workspace::acquire(
            self.config.workspace_root.as_deref(),
            build_id,
            self.config.keep_workspace,
        ) {
            Ok(workspace) => workspace,
            Err(e) => {
                error!(error = %e, "Failed to acquire workspace");
                report.output.exit_code = -1;
                report
                    .output
                    .append_error(&format!("{} failed: {}", StageKind::Acquire, e));
                report.stages.push(stage_report(StageKind::Acquire, -1, started));
                report.failure = Some(StageFailure {
                    stage: StageKind::Acquire,
                    cause: FailureCause::Workspace(e.to_string()),
                });
                self.set_phase(PipelinePhase::Failed);
                return report;
            }
        };
        report.stages.push(stage_report(StageKind::Acquire, 0, started));

        let deadline = self.config.stage_timeout();
        for spec in plan {
            self.set_phase(spec.kind.phase());
            let started = Instant::now();
            let result = run_stage(
                &spec,
                workspace.path(),
                deadline,
                &mut report.output,
            )
            .instrument(stage_span(build_id, spec.kind.label()))
            .await;
            report
                .stages
                .push(stage_report(spec.kind, report.output.exit_code, started));

            if let Err(cause) = result {
                info!(stage = %spec.kind, cause = %cause, "Stage failed, stopping pipeline");
                report.failure = Some(StageFailure {
                    stage: spec.kind,
                    cause,
                });
                break;
            }
        }

        report.workspace = workspace.release();

        let phase = if report.failure.is_some() {
            PipelinePhase::Failed
        } else {
            PipelinePhase::Succeeded
        };
        self.set_phase(phase);

        info!(
            outcome = %report.outcome(),
            exit_code = report.output.exit_code,
            stages = report.stages.len(),
            "Pipeline finished"
        );
        report
    }

    fn set_phase(&self, phase: PipelinePhase) {
        let previous = self.phase.send_replace(phase);
        if !previous.can_transition_to(phase) {
            warn!(from = ?previous, to = ?phase, "Unexpected pipeline phase change, overlapping builds?");
        }
    }
}

fn stage_report(kind: StageKind, exit_code: i32, started: Instant) -> StageReport {
    StageReport {
        kind,
        exit_code,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}
