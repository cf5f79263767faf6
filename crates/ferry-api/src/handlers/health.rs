//! Health check handlers.

use axum::Json;
use ferry_core::protocol::HealthResponse;

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy(None))
}
