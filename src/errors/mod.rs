//! Error handling module for the realtime channel.
//!
//! Only caller mistakes surface as errors. Transport failures are absorbed by
//! the service and reported through the `error` / `disconnected` events.

use tokio_tungstenite::tungstenite;

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const MISSING_TOKEN: &str = "MISSING_TOKEN";
    pub const CONFIG_ERROR: &str = "CONFIG_ERROR";
    pub const INVALID_ENDPOINT: &str = "INVALID_ENDPOINT";
    pub const CONNECTION_ERROR: &str = "CONNECTION_ERROR";
    pub const PROTOCOL_ERROR: &str = "PROTOCOL_ERROR";
    pub const SERIALIZATION_ERROR: &str = "SERIALIZATION_ERROR";
    pub const RUNTIME_ERROR: &str = "RUNTIME_ERROR";
}

/// Realtime channel error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RealtimeError {
    /// No (or a blank) auth token was supplied
    MissingToken,
    /// Invalid configuration value
    Config(String),
    /// Endpoint URL could not be built or has the wrong scheme
    InvalidEndpoint(String),
    /// Socket could not be opened or failed mid-stream
    Connection(String),
    /// Peer violated the message envelope
    Protocol(String),
    /// JSON encoding or decoding failed
    Serialization(String),
    /// Called outside a Tokio runtime
    Runtime(String),
}

impl RealtimeError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            RealtimeError::MissingToken => codes::MISSING_TOKEN,
            RealtimeError::Config(_) => codes::CONFIG_ERROR,
            RealtimeError::InvalidEndpoint(_) => codes::INVALID_ENDPOINT,
            RealtimeError::Connection(_) => codes::CONNECTION_ERROR,
            RealtimeError::Protocol(_) => codes::PROTOCOL_ERROR,
            RealtimeError::Serialization(_) => codes::SERIALIZATION_ERROR,
            RealtimeError::Runtime(_) => codes::RUNTIME_ERROR,
        }
    }

    /// Get the error message.
    pub fn message(&self) -> String {
        match self {
            RealtimeError::MissingToken => "No auth token provided".to_string(),
            RealtimeError::Config(msg) => msg.clone(),
            RealtimeError::InvalidEndpoint(msg) => msg.clone(),
            RealtimeError::Connection(msg) => msg.clone(),
            RealtimeError::Protocol(msg) => msg.clone(),
            RealtimeError::Serialization(msg) => msg.clone(),
            RealtimeError::Runtime(msg) => msg.clone(),
        }
    }
}

impl std::fmt::Display for RealtimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error_code(), self.message())
    }
}

impl std::error::Error for RealtimeError {}

impl From<tungstenite::Error> for RealtimeError {
    fn from(err: tungstenite::Error) -> Self {
        tracing::debug!("WebSocket error: {:?}", err);
        RealtimeError::Connection(format!("WebSocket error: {}", err))
    }
}

impl From<serde_json::Error> for RealtimeError {
    fn from(err: serde_json::Error) -> Self {
        tracing::debug!("JSON error: {:?}", err);
        RealtimeError::Serialization(format!("JSON error: {}", err))
    }
}

impl From<url::ParseError> for RealtimeError {
    fn from(err: url::ParseError) -> Self {
        RealtimeError::InvalidEndpoint(format!("Invalid URL: {}", err))
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, RealtimeError>;
