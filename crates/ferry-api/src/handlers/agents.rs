//! Agent handlers.

use axum::{Json, extract::State, http::StatusCode};
use ferry_core::protocol::{AgentListResponse, RegisterAgentRequest};
use std::sync::Arc;

use super::error_response;
use crate::state::AppState;

pub async fn register_agent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterAgentRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    request.validate().map_err(error_response)?;

    state.scheduler.register_agent(request.address()).await;
    Ok(StatusCode::OK)
}

pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<AgentListResponse> {
    Json(AgentListResponse {
        agents: state.scheduler.agents().await,
    })
}
