//! Ferry CI Core
//!
//! Core domain types, RPC schemas, transport ports and error handling for
//! Ferry CI. Every other crate speaks this vocabulary. It does no I/O of
//! its own: serde and chrono for the data, thiserror for errors and
//! async-trait for the ports.

pub mod agent;
pub mod build;
pub mod error;
pub mod ids;
pub mod ports;
pub mod protocol;

pub use error::{Error, Result};
pub use ids::*;
