//! In-memory session registry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::debug;

use quotahub_core::error::AppError;
use quotahub_core::result::AppResult;
use quotahub_core::types::{ConnectionId, QuotaLimits, SessionId, SubscriberId};
use quotahub_entity::session::{DeviceSession, NewDeviceSession, distinct_devices};

use crate::store::{DeviceBinding, SessionStore};

type DeviceKey = (SubscriberId, String);

/// Session rows keyed by `(subscriber, device)`.
///
/// The key enforces one row per device of a subscriber.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionStore {
    rows: Arc<DashMap<DeviceKey, DeviceSession>>,
    /// Serializes count-then-bind across all subscribers.
    binding: Arc<Mutex<()>>,
}

impl MemorySessionStore {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total rows across all subscribers.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the registry holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Insert a row as-is, bypassing admission. Used to simulate rows left
    /// behind by another process.
    pub fn insert_raw(&self, row: DeviceSession) {
        self.rows
            .insert((row.subscriber_id, row.device_id.clone()), row);
    }

    fn key_of(&self, connection_id: ConnectionId) -> Option<DeviceKey> {
        self.rows
            .iter()
            .find(|entry| entry.connection_id == connection_id)
            .map(|entry| entry.key().clone())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn list_by_subscriber(
        &self,
        subscriber_id: SubscriberId,
    ) -> AppResult<Vec<DeviceSession>> {
        let mut rows: Vec<DeviceSession> = self
            .rows
            .iter()
            .filter(|entry| entry.key().0 == subscriber_id)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by_key(|row| row.created_at);
        Ok(rows)
    }

    async fn upsert(&self, session: &NewDeviceSession) -> AppResult<DeviceSession> {
        let key = (session.subscriber_id, session.device_id.clone());

        if let Some(existing) = self.key_of(session.connection_id) {
            if existing != key {
                return Err(AppError::conflict(format!(
                    "Connection {} already bound to another device",
                    session.connection_id
                )));
            }
        }

        let now = Utc::now();
        let row = DeviceSession {
            id: SessionId::new(),
            subscriber_id: session.subscriber_id,
            device_id: session.device_id.clone(),
            connection_id: session.connection_id,
            device_info: session.device_info.clone(),
            created_at: now,
            last_seen_at: now,
        };
        self.rows.insert(key, row.clone());
        Ok(row)
    }

    async fn bind_device(
        &self,
        session: &NewDeviceSession,
        limits: &QuotaLimits,
    ) -> AppResult<DeviceBinding> {
        let _held = self.binding.lock().await;

        let rows = self.list_by_subscriber(session.subscriber_id).await?;
        let devices = distinct_devices(&rows);
        let reconnect = devices.contains(session.device_id.as_str());
        if !reconnect && limits.devices_full(devices.len()) {
            return Ok(DeviceBinding::Full {
                active_devices: devices.len(),
            });
        }

        let session = self.upsert(session).await?;
        Ok(DeviceBinding::Bound { session, reconnect })
    }

    async fn remove_by_connection(
        &self,
        connection_id: ConnectionId,
    ) -> AppResult<Option<DeviceSession>> {
        let Some(key) = self.key_of(connection_id) else {
            return Ok(None);
        };
        // The row may have been replaced between the lookup and the delete.
        Ok(self
            .rows
            .remove_if(&key, |_, row| row.connection_id == connection_id)
            .map(|(_, row)| row))
    }

    async fn touch(&self, connection_id: ConnectionId) -> AppResult<bool> {
        let Some(key) = self.key_of(connection_id) else {
            return Ok(false);
        };
        match self.rows.get_mut(&key) {
            Some(mut row) if row.connection_id == connection_id => {
                row.last_seen_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn remove_stale(
        &self,
        cutoff: DateTime<Utc>,
        live: &[ConnectionId],
    ) -> AppResult<Vec<DeviceSession>> {
        let candidates: Vec<DeviceKey> = self
            .rows
            .iter()
            .filter(|entry| entry.is_stale(cutoff) && !live.contains(&entry.connection_id))
            .map(|entry| entry.key().clone())
            .collect();

        let removed: Vec<DeviceSession> = candidates
            .into_iter()
            .filter_map(|key| {
                self.rows
                    .remove_if(&key, |_, row| {
                        row.is_stale(cutoff) && !live.contains(&row.connection_id)
                    })
                    .map(|(_, row)| row)
            })
            .collect();

        if !removed.is_empty() {
            debug!(count = removed.len(), "Removed stale in-memory sessions");
        }
        Ok(removed)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
