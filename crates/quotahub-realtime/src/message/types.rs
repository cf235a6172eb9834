//! Inbound and outbound WebSocket message type definitions.

use serde::{Deserialize, Serialize};

/// Messages sent by the client to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// One unit of quota-consuming work finished on the client.
    TaskComplete {
        /// Client payload, accepted and ignored.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<serde_json::Value>,
    },
}

/// Messages sent by the server to the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    /// Quota state sent once after admission.
    InitState {
        /// Usage counted today.
        daily_usage: u32,
        /// Today's allowance.
        daily_limit: u32,
        /// Governing plan name.
        plan_name: String,
        /// Subscriber's first name.
        first_name: String,
    },
    /// The daily allowance is used up.
    LimitReached {
        /// Human-readable notice.
        message: String,
    },
    /// Usage changed on one of the subscriber's devices.
    UpdateUsage {
        /// Usage counted today.
        daily_usage: u32,
        /// Today's allowance.
        daily_limit: u32,
    },
    /// An operation failed or the connection was refused.
    Error {
        /// Human-readable message.
        message: String,
    },
}

impl OutboundMessage {
    /// Creates an error message.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Creates a limit-reached notice.
    pub fn limit_reached(message: impl Into<String>) -> Self {
        Self::LimitReached {
            message: message.into(),
        }
    }

    /// Creates a usage update.
    pub fn update_usage(daily_usage: u32, daily_limit: u32) -> Self {
        Self::UpdateUsage {
            daily_usage,
            daily_limit,
        }
    }

    /// Wire name of the message type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InitState { .. } => "init_state",
            Self::LimitReached { .. } => "limit_reached",
            Self::UpdateUsage { .. } => "update_usage",
            Self::Error { .. } => "error",
        }
    }
}
