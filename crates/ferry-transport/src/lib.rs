//! HTTP implementations of the coordinator/agent transport ports.

mod agent;
mod client;
mod coordinator;

pub use agent::HttpAgentTransport;
pub use client::TransportConfig;
pub use coordinator::HttpCoordinatorTransport;
