//! The `{type, payload}` message envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{RealtimeError, Result};

/// Message envelope, identical for both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl Envelope {
    pub fn new(message_type: impl Into<String>, payload: Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
        }
    }

    /// Parse an inbound text frame.
    pub fn parse(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;
        if envelope.message_type.is_empty() {
            return Err(RealtimeError::Protocol(
                "Message has an empty type".to_string(),
            ));
        }
        Ok(envelope)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
