//! Stage descriptors and the ordered plan of a build.

use ferry_core::agent::PipelinePhase;
use ferry_core::protocol::BuildCommand;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed stages of a build, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Acquire,
    Fetch,
    Checkout,
    Install,
    Run,
}

impl StageKind {
    /// Label used to prefix logged output, e.g. `CHECKOUT STDOUT`.
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::Acquire => "ACQUIRE",
            StageKind::Fetch => "FETCH",
            StageKind::Checkout => "CHECKOUT",
            StageKind::Install => "INSTALL",
            StageKind::Run => "RUN",
        }
    }

    /// Phase the pipeline is in while this stage executes.
    pub fn phase(&self) -> PipelinePhase {
        match self {
            StageKind::Acquire => PipelinePhase::Acquiring,
            StageKind::Fetch => PipelinePhase::Fetching,
            StageKind::Checkout => PipelinePhase::CheckingOut,
            StageKind::Install => PipelinePhase::Installing,
            StageKind::Run => PipelinePhase::Running,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One child-process invocation: a program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageSpec {
    pub kind: StageKind,
    pub program: String,
    pub args: Vec<String>,
}

impl StageSpec {
    pub fn new<I, S>(kind: StageKind, program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            kind,
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a command line on whitespace into program and arguments. An
    /// empty line yields an empty program, which fails at launch.
    pub fn from_command_line(kind: StageKind, line: &str) -> Self {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_default();
        Self {
            kind,
            program,
            args: parts.collect(),
        }
    }

    /// Shell-like rendering for logs.
    pub fn display_command(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Command templates for the environment-specific stages.
///
/// `{source}` and `{revision}` are substituted per token after splitting on
/// whitespace, so a source path containing spaces stays one argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCommands {
    #[serde(default = "default_fetch")]
    pub fetch: String,
    #[serde(default = "default_checkout")]
    pub checkout: String,
    #[serde(default = "default_install")]
    pub install: String,
}

fn default_fetch() -> String {
    "git clone {source} .".to_string()
}

fn default_checkout() -> String {
    "git checkout {revision}".to_string()
}

fn default_install() -> String {
    "npm install".to_string()
}

impl Default for StageCommands {
    fn default() -> Self {
        Self {
            fetch: default_fetch(),
            checkout: default_checkout(),
            install: default_install(),
        }
    }
}

impl StageCommands {
    fn render(kind: StageKind, template: &str, command: &BuildCommand) -> StageSpec {
        let mut parts = template.split_whitespace().map(|token| {
            token
                .replace("{source}", &command.path)
                .replace("{revision}", &command.hash)
        });
        let program = parts.next().unwrap_or_default();
        StageSpec {
            kind,
            program,
            args: parts.collect(),
        }
    }
}

/// The ordered process stages of one build. Workspace acquisition always
/// precedes them and is not part of the plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePlan {
    stages: Vec<StageSpec>,
}

impl PipelinePlan {
    pub fn new(stages: Vec<StageSpec>) -> Self {
        Self { stages }
    }

    /// Fetch, checkout, install, then the build's own command.
    pub fn for_command(commands: &StageCommands, command: &BuildCommand) -> Self {
        Self::new(vec![
            StageCommands::render(StageKind::Fetch, &commands.fetch, command),
            StageCommands::render(StageKind::Checkout, &commands.checkout, command),
            StageCommands::render(StageKind::Install, &commands.install, command),
            StageSpec::from_command_line(StageKind::Run, &command.command),
        ])
    }

    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }
}

impl IntoIterator for PipelinePlan {
    type Item = StageSpec;
    type IntoIter = std::vec::IntoIter<StageSpec>;

    fn into_iter(self) -> Self::IntoIter {
        self.stages.into_iter()
    }
}
