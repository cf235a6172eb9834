//! Session registry over the persisted `device_sessions` rows.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use quotahub_core::result::AppResult;
use quotahub_core::types::{ConnectionId, SubscriberId};
use quotahub_database::store::SessionStore;
use quotahub_entity::session::DeviceSession;

/// Live `(subscriber, device) → connection` bindings.
///
/// Rows are written by device admission; this type serves the readers and
/// the removal paths.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    store: Arc<dyn SessionStore>,
}

impl SessionRegistry {
    /// Creates a registry over `store`.
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> Arc<dyn SessionStore> {
        self.store.clone()
    }

    /// All rows of a subscriber.
    pub async fn list_sessions(&self, subscriber_id: SubscriberId) -> AppResult<Vec<DeviceSession>> {
        self.store.list_by_subscriber(subscriber_id).await
    }

    /// Deletes the row bound to `connection_id`.
    ///
    /// A no-op when the row was already removed or rebound to a newer
    /// connection of the same device.
    pub async fn remove(&self, connection_id: ConnectionId) -> AppResult<Option<DeviceSession>> {
        let removed = self.store.remove_by_connection(connection_id).await?;
        match &removed {
            Some(row) => info!(
                conn_id = %connection_id,
                subscriber_id = %row.subscriber_id,
                device_id = %row.device_id,
                "Device session removed"
            ),
            None => debug!(conn_id = %connection_id, "No session row bound to connection"),
        }
        Ok(removed)
    }

    /// Refreshes the heartbeat timestamp of the row bound to `connection_id`.
    pub async fn touch(&self, connection_id: ConnectionId) -> AppResult<bool> {
        self.store.touch(connection_id).await
    }

    /// Deletes rows idle since before `cutoff` that no live connection owns.
    pub async fn reap(
        &self,
        cutoff: DateTime<Utc>,
        live: &[ConnectionId],
    ) -> AppResult<Vec<DeviceSession>> {
        self.store.remove_stale(cutoff, live).await
    }

    /// Backend connectivity.
    pub async fn health_check(&self) -> AppResult<bool> {
        self.store.health_check().await
    }
}
