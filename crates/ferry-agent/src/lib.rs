//! Build agent for Ferry CI.
//!
//! Registers with a coordinator, accepts dispatched builds over HTTP and
//! reports each pipeline's result back.

pub mod agent;
pub mod config;
pub mod handlers;
pub mod registration;
pub mod routes;
pub mod service;

pub use agent::BuildAgent;
pub use config::AgentConfig;
pub use registration::{Registrar, RegistrationConfig, RegistrationState};
pub use routes::create_router;
pub use service::AgentService;
