//! Error types for Ferry CI.

use crate::ids::BuildId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    // Coordinator consistency errors
    #[error("Unknown build: {0}")]
    UnknownBuild(BuildId),

    #[error("No assignment for {0}")]
    NoAssignment(BuildId),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    // Transport errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Registration failed after {attempts} attempts")]
    RegistrationFailed { attempts: u32 },

    // Agent errors
    #[error("Workspace error: {0}")]
    Workspace(String),

    // Infrastructure errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
