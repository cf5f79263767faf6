//! Build pipeline execution for Ferry CI agents.
//!
//! A build runs as a fixed chain of child processes inside a fresh
//! workspace: fetch the source, check out the revision, install
//! dependencies, then run the requested command. Output from every stage
//! is streamed to the log and accumulated into one result.

pub mod pipeline;
pub mod process;
pub mod runner;
pub mod stage;
pub mod workspace;

pub use pipeline::{PipelineReport, PipelineRunner, StageReport};
pub use process::run_stage;
pub use ferry_core::agent::PipelinePhase;
pub use runner::{BuildOutput, FailureCause, OutputChunk, OutputStream, RunnerConfig, StageFailure};
pub use stage::{PipelinePlan, StageCommands, StageKind, StageSpec};
pub use workspace::Workspace;
