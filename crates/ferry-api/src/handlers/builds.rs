//! Build handlers.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use ferry_core::build::Build;
use ferry_core::ids::BuildId;
use ferry_core::protocol::{
    BuildResultReport, StatusResponse, SubmitBuildRequest, SubmitBuildResponse,
};
use std::sync::Arc;
use tracing::warn;

use super::error_response;
use crate::state::AppState;

pub async fn submit_build(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SubmitBuildRequest>,
) -> Json<SubmitBuildResponse> {
    if request.revision.trim().is_empty() || request.command.trim().is_empty() {
        warn!(revision = %request.revision, command = %request.command, "Build submitted with empty field");
    }

    let build_id = state
        .scheduler
        .submit_build(request.revision, request.command)
        .await;
    Json(SubmitBuildResponse { build_id })
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        builds: state.scheduler.builds().await,
    })
}

pub async fn get_build(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Build>, (StatusCode, String)> {
    let build_id: BuildId = id
        .parse()
        .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid build ID".to_string()))?;

    let build = state
        .scheduler
        .build(build_id)
        .await
        .ok_or((StatusCode::NOT_FOUND, "Build not found".to_string()))?;

    Ok(Json(build))
}

pub async fn report_result(
    State(state): State<Arc<AppState>>,
    Json(report): Json<BuildResultReport>,
) -> Result<StatusCode, (StatusCode, String)> {
    state
        .scheduler
        .report_result(report)
        .await
        .map_err(error_response)?;

    Ok(StatusCode::OK)
}
