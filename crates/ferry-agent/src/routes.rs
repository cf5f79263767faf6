//! Agent route definitions.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::service::AgentService;

/// Create the agent router.
pub fn create_router(service: Arc<AgentService>) -> Router {
    Router::new()
        .route("/build", post(handlers::start_build))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}
