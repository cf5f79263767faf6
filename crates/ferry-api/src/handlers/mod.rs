//! Request handlers organized by resource.

pub mod agents;
pub mod builds;
pub mod health;

use axum::http::StatusCode;
use ferry_core::Error;

/// Map a domain error to the status code and message returned to callers.
pub fn error_response(err: Error) -> (StatusCode, String) {
    let status = match &err {
        Error::UnknownBuild(_) => StatusCode::NOT_FOUND,
        Error::NoAssignment(_) => StatusCode::CONFLICT,
        Error::InvalidPayload(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}
