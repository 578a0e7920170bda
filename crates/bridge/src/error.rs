// Bridge error types

use promptrelay_core::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Relay rejected authentication: {0}")]
    TransportRejected(String),

    #[error("Gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),

    #[error("Connect failed: {0}")]
    Connect(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

impl From<BridgeError> for AppError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::TransportRejected(reason) => AppError::TransportRejected(reason),
            BridgeError::Serialization(e) => AppError::Serialization(e),
            other => AppError::Session(other.to_string()),
        }
    }
}
