//! JSON text-frame encoding.

use quotahub_core::error::{AppError, ErrorKind};

use super::types::{InboundMessage, OutboundMessage};

/// Serializes an outbound message to a JSON text frame.
pub fn encode(message: &OutboundMessage) -> Result<String, AppError> {
    serde_json::to_string(message).map_err(|e| {
        AppError::with_source(
            ErrorKind::Serialization,
            format!("Failed to encode {} message", message.kind()),
            e,
        )
    })
}

/// Parses a client text frame.
pub fn decode(raw: &str) -> Result<InboundMessage, AppError> {
    serde_json::from_str(raw)
        .map_err(|e| AppError::validation(format!("Failed to parse message: {e}")))
}
