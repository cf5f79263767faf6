//! Shared HTTP client construction and response handling.

use ferry_core::{Error, Result};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Timeouts applied to every request a transport makes.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Deadline for a whole request, including reading the response.
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    pub fn with_request_timeout(timeout: Duration) -> Self {
        Self {
            request_timeout: timeout,
            connect_timeout: timeout.min(Self::default().connect_timeout),
        }
    }

    pub(crate) fn build_client(&self) -> Result<Client> {
        Client::builder()
            .timeout(self.request_timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))
    }
}

pub(crate) fn send_error(url: &str, err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Transport(format!("{}: request timed out", url))
    } else if err.is_connect() {
        Error::Transport(format!("{}: connection failed: {}", url, err))
    } else {
        Error::Transport(format!("{}: {}", url, err))
    }
}

/// Turn a non-2xx response into `Error::Rejected`, carrying the body text.
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {}>", e));
    Err(Error::Rejected {
        status: status.as_u16(),
        message,
    })
}

pub(crate) async fn read_json<T: DeserializeOwned>(url: &str, response: Response) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::Transport(format!("{}: invalid response body: {}", url, e)))
}

pub(crate) fn join(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
