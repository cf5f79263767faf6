//! Coordinator service for Ferry CI.
//!
//! Accepts build submissions, agent registrations and result reports over
//! HTTP and drives the scheduler that matches builds to agents.

pub mod config;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use config::CoordinatorConfig;
pub use routes::create_router;
pub use server::Coordinator;
pub use state::AppState;
