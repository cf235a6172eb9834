//! Store traits for the collaborator data this core reads and writes.
//!
//! The quota counter and the device count are checked and changed in one
//! store-level step ([`SubscriberStore::consume_usage`],
//! [`SessionStore::bind_device`]), so several server processes can share
//! one database. The in-process
//! [`SubscriberLocks`](quotahub_core::lock::SubscriberLocks) only keeps one
//! process from contending with itself.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use quotahub_core::result::AppResult;
use quotahub_core::types::{ConnectionId, QuotaLimits, SubscriberId};
use quotahub_entity::session::{DeviceSession, NewDeviceSession};
use quotahub_entity::subscriber::SubscriberWithPlan;

/// Result of [`SubscriberStore::consume_usage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageUpdate {
    /// The counter grew by one to the contained value.
    Consumed(u32),
    /// The allowance was already used up; the counter is unchanged.
    Refused(u32),
}

/// Result of [`SessionStore::bind_device`].
#[derive(Debug, Clone)]
pub enum DeviceBinding {
    /// The device now owns a row bound to the new connection.
    Bound {
        /// The new row.
        session: DeviceSession,
        /// Whether the device already had a row.
        reconnect: bool,
    },
    /// Every device slot is taken by other devices. Nothing was written.
    Full {
        /// Distinct devices holding a row.
        active_devices: usize,
    },
}

/// Subscriber lookup and quota persistence.
#[async_trait]
pub trait SubscriberStore: Send + Sync + std::fmt::Debug + 'static {
    /// Load a subscriber joined with its plan.
    async fn find_with_plan(&self, id: SubscriberId) -> AppResult<Option<SubscriberWithPlan>>;

    /// Zero the counter if it belongs to a day other than `today`.
    ///
    /// Returns whether a reset was written. Fails with `NotFound` if the
    /// subscriber does not exist.
    async fn reset_stale_usage(&self, id: SubscriberId, today: NaiveDate) -> AppResult<bool>;

    /// Count one use against `today`, unless `daily_limit` is already
    /// reached.
    ///
    /// A counter from an earlier day counts as zero. The check and the
    /// increment are a single atomic step. Fails with `NotFound` if the
    /// subscriber does not exist.
    async fn consume_usage(
        &self,
        id: SubscriberId,
        today: NaiveDate,
        daily_limit: u32,
    ) -> AppResult<UsageUpdate>;

    /// Check backend connectivity.
    async fn health_check(&self) -> AppResult<bool>;
}

/// Persisted registry of live `(subscriber, device) → connection` bindings.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug + 'static {
    /// All session rows of a subscriber, oldest first.
    async fn list_by_subscriber(&self, subscriber_id: SubscriberId)
    -> AppResult<Vec<DeviceSession>>;

    /// Replace the row of `(subscriber_id, device_id)` with a fresh one bound
    /// to the new connection. All-or-nothing.
    async fn upsert(&self, session: &NewDeviceSession) -> AppResult<DeviceSession>;

    /// Bind `session` if its device already has a row or a device slot is
    /// free under `limits`, as one atomic step per subscriber.
    async fn bind_device(
        &self,
        session: &NewDeviceSession,
        limits: &QuotaLimits,
    ) -> AppResult<DeviceBinding>;

    /// Delete the row bound to `connection_id`, if it still exists.
    ///
    /// A row already superseded by a newer connection of the same device is
    /// left untouched.
    async fn remove_by_connection(
        &self,
        connection_id: ConnectionId,
    ) -> AppResult<Option<DeviceSession>>;

    /// Refresh `last_seen_at` of the row bound to `connection_id`.
    ///
    /// Returns `false` if no such row exists.
    async fn touch(&self, connection_id: ConnectionId) -> AppResult<bool>;

    /// Delete rows not refreshed since `cutoff`, except those bound to a
    /// connection in `live`.
    async fn remove_stale(
        &self,
        cutoff: DateTime<Utc>,
        live: &[ConnectionId],
    ) -> AppResult<Vec<DeviceSession>>;

    /// Check backend connectivity.
    async fn health_check(&self) -> AppResult<bool>;
}
