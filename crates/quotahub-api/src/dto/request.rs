//! Request DTOs.

use serde::Deserialize;
use validator::Validate;

/// Query parameters of the WebSocket handshake.
///
/// Both fields may instead arrive as headers, so neither is required here.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    /// Bearer token.
    #[validate(length(max = 4096))]
    pub token: Option<String>,
    /// Client device identifier.
    #[validate(length(max = 256))]
    pub device_id: Option<String>,
}
