//! Request handlers for the agent's HTTP surface.

use axum::{Json, extract::State, http::StatusCode};
use ferry_core::protocol::{BuildCommand, HealthResponse};
use std::sync::Arc;

use crate::service::AgentService;

/// Accept a dispatched build. Acknowledges immediately; the result is
/// reported to the coordinator when the pipeline finishes.
pub async fn start_build(
    State(service): State<Arc<AgentService>>,
    Json(command): Json<BuildCommand>,
) -> StatusCode {
    // The supervisor reports a failure if the build task dies.
    drop(service.accept(command));
    StatusCode::OK
}

pub async fn health(State(service): State<Arc<AgentService>>) -> Json<HealthResponse> {
    Json(service.health())
}
