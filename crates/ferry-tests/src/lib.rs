//! End-to-end test harness for Ferry CI.
//!
//! Starts a real coordinator and real agents on ephemeral loopback ports
//! and drives them over HTTP.
//!
//! # Usage
//!
//! ```ignore
//! use ferry_tests::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let coordinator = start_coordinator(coordinator_config("/srv/repo")).await.unwrap();
//!     let agent = start_agent(agent_config(coordinator.addr, workspace.path())).await.unwrap();
//!     let client = ApiTestClient::new(coordinator.addr);
//! }
//! ```

pub mod fixtures;
pub mod helpers;

pub use fixtures::*;
pub use helpers::*;

/// Initialize test logging (call once per test binary).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,ferry_scheduler=debug,ferry_runner=info")),
        )
        .with_test_writer()
        .try_init();
}
