//! Response bodies.

use serde::{Deserialize, Serialize};

/// Envelope around every successful JSON body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Always `true`; failures use the error body instead.
    pub success: bool,
    /// Payload.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Wraps `data` in a successful envelope.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Overall service condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStatus {
    /// Every dependency answered.
    Ok,
    /// At least one store failed its probe.
    Degraded,
}

/// Result of probing one store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreStatus {
    Connected,
    Unavailable,
}

impl From<bool> for StoreStatus {
    fn from(reachable: bool) -> Self {
        if reachable {
            Self::Connected
        } else {
            Self::Unavailable
        }
    }
}

/// Body of `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Body of `GET /api/health/detailed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedHealthResponse {
    /// `degraded` if either store is unavailable.
    pub status: ServiceStatus,
    pub subscriber_store: StoreStatus,
    pub session_store: StoreStatus,
    /// Live WebSocket connections in this process.
    pub ws_connections: usize,
    /// Subscribers with at least one live connection here.
    pub online_subscribers: usize,
}
