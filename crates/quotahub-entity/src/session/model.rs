//! Device session entity model.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use quotahub_core::types::{ConnectionId, SessionId, SubscriberId};

/// One live connection of one device of one subscriber.
///
/// At most one row exists per `(subscriber_id, device_id)`; a reconnect
/// from a known device replaces the row instead of adding a second one.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DeviceSession {
    /// Unique row identifier.
    pub id: SessionId,
    /// The subscriber this session belongs to.
    pub subscriber_id: SubscriberId,
    /// Stable client-supplied device identifier.
    pub device_id: String,
    /// Handle of the live connection bound to this row.
    pub connection_id: ConnectionId,
    /// Device metadata captured at the handshake (JSON).
    pub device_info: Option<serde_json::Value>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// Last heartbeat observed for the bound connection.
    pub last_seen_at: DateTime<Utc>,
}

impl DeviceSession {
    /// Check whether the row has not been refreshed since `cutoff`.
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        self.last_seen_at < cutoff
    }
}

/// Data required to bind a connection to a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDeviceSession {
    /// The subscriber.
    pub subscriber_id: SubscriberId,
    /// The device identifier.
    pub device_id: String,
    /// The live connection handle.
    pub connection_id: ConnectionId,
    /// Device metadata.
    pub device_info: Option<serde_json::Value>,
}

/// Distinct device identifiers among `sessions`.
pub fn distinct_devices(sessions: &[DeviceSession]) -> BTreeSet<&str> {
    sessions.iter().map(|s| s.device_id.as_str()).collect()
}
