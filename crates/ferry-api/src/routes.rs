//! Coordinator route definitions.

use axum::{
    Router, middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::handlers::{agents, builds, health};
use crate::middleware::{cors_layer, request_id};
use crate::state::AppState;

/// Create the coordinator router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(builds::submit_build))
        .route("/status", get(builds::status))
        .route("/notify_agent", post(agents::register_agent))
        .route("/notify_build_result", post(builds::report_result))
        .route("/health", get(health::health))
        .route("/builds", post(builds::submit_build))
        .route("/builds/{id}", get(builds::get_build))
        .route("/agents", get(agents::list_agents))
        .layer(middleware::from_fn(request_id))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use ferry_core::Result;
    use ferry_core::agent::AgentAddress;
    use ferry_core::ports::AgentTransport;
    use ferry_core::protocol::{BuildCommand, HealthResponse};
    use ferry_scheduler::{Scheduler, SchedulerConfig};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    struct AcceptAll;

    #[async_trait]
    impl AgentTransport for AcceptAll {
        async fn dispatch(&self, _agent: &AgentAddress, _command: &BuildCommand) -> Result<()> {
            Ok(())
        }

        async fn probe(&self, _agent: &AgentAddress) -> Result<HealthResponse> {
            Ok(HealthResponse::healthy(None))
        }
    }

    fn app() -> (Router, Arc<Scheduler>) {
        let scheduler = Arc::new(Scheduler::new(SchedulerConfig::default(), Arc::new(AcceptAll)));
        let router = create_router(Arc::new(AppState::new(Arc::clone(&scheduler))));
        (router, scheduler)
    }

    fn router() -> Router {
        app().0
    }

    async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(body) => Body::from(body.to_string()),
                None => Body::empty(),
            })
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn test_submit_then_status() {
        let router = router();

        let (status, body) = call(
            &router,
            "POST",
            "/",
            Some(json!({"revision": "abc123", "command": "npm test"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["buildId"], 0);

        let (_, body) = call(&router, "POST", "/builds", Some(json!({"hash": "r2", "command": "make"}))).await;
        assert_eq!(body["buildId"], 1);

        let (status, body) = call(&router, "GET", "/status", None).await;
        assert_eq!(status, StatusCode::OK);
        let builds = body["builds"].as_array().unwrap();
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0]["state"], "pending");
        assert_eq!(builds[1]["revision"], "r2");
    }

    #[tokio::test]
    async fn test_register_dispatches_and_report_completes() {
        let (router, scheduler) = app();
        call(&router, "POST", "/", Some(json!({"revision": "r1", "command": "c1"}))).await;

        let (status, _) = call(
            &router,
            "POST",
            "/notify_agent",
            Some(json!({"host": "h1", "port": 9001})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        scheduler.settle().await;

        let (_, build) = call(&router, "GET", "/builds/0", None).await;
        assert_eq!(build["state"], "inProgress");
        let (_, agents) = call(&router, "GET", "/agents", None).await;
        assert_eq!(agents["agents"][0]["state"], "building");

        let report = json!({"buildId": 0, "state": "failure", "stdout": "", "stderr": "boom"});
        let (status, _) = call(&router, "POST", "/notify_build_result", Some(report.clone())).await;
        assert_eq!(status, StatusCode::OK);

        let (_, build) = call(&router, "GET", "/builds/0", None).await;
        assert_eq!(build["state"], "failure");
        assert_eq!(build["stderr"], "boom");

        let (status, _) = call(&router, "POST", "/notify_build_result", Some(report)).await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_report_rejections() {
        let router = router();

        let (status, _) = call(
            &router,
            "POST",
            "/notify_build_result",
            Some(json!({"buildId": 42, "state": "success"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = call(
            &router,
            "POST",
            "/notify_build_result",
            Some(json!({"buildId": 0, "state": "inProgress"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_register_validation() {
        let router = router();
        let (status, _) = call(
            &router,
            "POST",
            "/notify_agent",
            Some(json!({"host": "", "port": 9001})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

        let (status, _) = call(&router, "POST", "/notify_agent", Some(json!({"host": "h"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_build_ids() {
        let router = router();
        let (status, _) = call(&router, "GET", "/builds/7", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = call(&router, "GET", "/builds/seven", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_health_and_request_id() {
        let router = router();
        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
