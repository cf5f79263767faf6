//! Port traits (hexagonal architecture).
//!
//! These traits define the transport seams between the coordinator and its
//! agents. The HTTP adapters live in `ferry-transport`; tests substitute
//! in-memory implementations.

use crate::Result;
use crate::agent::AgentAddress;
use crate::protocol::{BuildCommand, BuildResultReport, HealthResponse, RegisterAgentRequest};
use async_trait::async_trait;

/// Coordinator-side view of the agents.
#[async_trait]
pub trait AgentTransport: Send + Sync {
    /// Offer a build to an agent. `Ok` means the agent accepted it; the
    /// result arrives later through [`CoordinatorTransport::report_result`].
    async fn dispatch(&self, agent: &AgentAddress, command: &BuildCommand) -> Result<()>;

    /// Probe the agent's liveness endpoint.
    async fn probe(&self, agent: &AgentAddress) -> Result<HealthResponse>;
}

/// Agent-side view of the coordinator.
#[async_trait]
pub trait CoordinatorTransport: Send + Sync {
    /// Announce this agent to the coordinator.
    async fn register(&self, request: &RegisterAgentRequest) -> Result<()>;

    /// Deliver the result of a finished build.
    async fn report_result(&self, report: &BuildResultReport) -> Result<()>;
}
