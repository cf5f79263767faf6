//! Span creation for build operations.

use ferry_core::agent::AgentAddress;
use ferry_core::ids::BuildId;
use tracing::{Level, Span, span};

/// Create a span covering one build's pipeline run on an agent.
pub fn build_span(build_id: BuildId) -> Span {
    span!(
        Level::INFO,
        "build.execute",
        ferry.build.id = build_id.get(),
    )
}

/// Create a span for one pipeline stage.
pub fn stage_span(build_id: BuildId, stage: &str) -> Span {
    span!(
        Level::INFO,
        "stage.execute",
        ferry.build.id = build_id.get(),
        ferry.stage.name = stage,
    )
}

/// Create a span for a coordinator-side operation against one agent.
pub fn agent_span(address: &AgentAddress, operation: &str) -> Span {
    span!(
        Level::INFO,
        "agent.operation",
        operation = operation,
        ferry.agent.address = %address,
    )
}
