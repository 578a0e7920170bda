// CDP error types

use promptrelay_core::port::DriverError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CdpError {
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("CDP connection closed")]
    Closed,

    #[error("CDP command {method} timed out after {ms}ms")]
    Timeout { method: String, ms: u64 },

    /// Error object returned by the browser for a command
    #[error("{message} (code {code})")]
    Protocol { code: i64, message: String },

    #[error("JavaScript exception: {0}")]
    Exception(String),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("DevTools HTTP error: {0}")]
    Http(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for CdpError {
    fn from(err: reqwest::Error) -> Self {
        CdpError::Http(err.to_string())
    }
}

impl From<CdpError> for DriverError {
    fn from(err: CdpError) -> Self {
        match err {
            CdpError::Connect { .. } | CdpError::Closed => DriverError::Disconnected(err.to_string()),
            CdpError::Timeout { ms, .. } => DriverError::Timeout(ms),
            // keep the browser's wording intact so destroyed-frame messages stay recognizable
            CdpError::Protocol { message, .. } => DriverError::Protocol(message),
            CdpError::Exception(text) => DriverError::Evaluation(text),
            other => DriverError::Protocol(other.to_string()),
        }
    }
}
