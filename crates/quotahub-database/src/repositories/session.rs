//! Device session repository implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use uuid::Uuid;

use quotahub_core::error::{AppError, ErrorKind};
use quotahub_core::result::AppResult;
use quotahub_core::types::{ConnectionId, QuotaLimits, SessionId, SubscriberId};
use quotahub_entity::session::{DeviceSession, NewDeviceSession};

use crate::store::{DeviceBinding, SessionStore};

/// PostgreSQL-backed session registry.
///
/// The table carries `UNIQUE (subscriber_id, device_id)` and
/// `UNIQUE (connection_id)`. Admission takes a transaction-scoped advisory
/// lock per subscriber, so the device count cannot change between the
/// check and the insert, even across processes.
#[derive(Debug, Clone)]
pub struct SessionRepository {
    pool: PgPool,
}

impl SessionRepository {
    /// Create a new session repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> AppResult<Transaction<'static, Postgres>> {
        self.pool.begin().await.map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to begin transaction", e)
        })
    }
}

async fn commit(tx: Transaction<'static, Postgres>) -> AppResult<()> {
    tx.commit().await.map_err(|e| {
        AppError::with_source(ErrorKind::Database, "Failed to commit device session", e)
    })
}

/// Advisory lock key of a subscriber: the high half of its UUID.
fn advisory_key(subscriber_id: SubscriberId) -> i64 {
    let (high, _) = subscriber_id.into_uuid().as_u64_pair();
    high as i64
}

/// Delete the device's row, if any, and insert one bound to the new
/// connection.
async fn replace_device(
    conn: &mut PgConnection,
    session: &NewDeviceSession,
) -> AppResult<DeviceSession> {
    sqlx::query("DELETE FROM device_sessions WHERE subscriber_id = $1 AND device_id = $2")
        .bind(session.subscriber_id)
        .bind(&session.device_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to clear device session", e)
        })?;

    sqlx::query_as::<_, DeviceSession>(
        "INSERT INTO device_sessions (id, subscriber_id, device_id, connection_id, device_info) \
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(SessionId::new())
    .bind(session.subscriber_id)
    .bind(&session.device_id)
    .bind(session.connection_id)
    .bind(&session.device_info)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => AppError::with_source(
            ErrorKind::Conflict,
            "Device session already registered",
            e,
        ),
        _ => AppError::with_source(ErrorKind::Database, "Failed to create device session", e),
    })
}

#[async_trait]
impl SessionStore for SessionRepository {
    async fn list_by_subscriber(
        &self,
        subscriber_id: SubscriberId,
    ) -> AppResult<Vec<DeviceSession>> {
        sqlx::query_as::<_, DeviceSession>(
            "SELECT * FROM device_sessions WHERE subscriber_id = $1 ORDER BY created_at ASC",
        )
        .bind(subscriber_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list sessions", e))
    }

    async fn upsert(&self, session: &NewDeviceSession) -> AppResult<DeviceSession> {
        let mut tx = self.begin().await?;
        let row = replace_device(&mut *tx, session).await?;
        commit(tx).await?;
        Ok(row)
    }

    async fn bind_device(
        &self,
        session: &NewDeviceSession,
        limits: &QuotaLimits,
    ) -> AppResult<DeviceBinding> {
        let mut tx = self.begin().await?;

        // Held until commit or rollback; other processes admitting for the
        // same subscriber wait here.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(advisory_key(session.subscriber_id))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to lock subscriber", e)
            })?;

        let devices = sqlx::query_scalar::<_, String>(
            "SELECT DISTINCT device_id FROM device_sessions WHERE subscriber_id = $1",
        )
        .bind(session.subscriber_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count devices", e))?;

        let reconnect = devices.iter().any(|d| *d == session.device_id);
        if !reconnect && limits.devices_full(devices.len()) {
            tx.rollback().await.map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to release subscriber", e)
            })?;
            return Ok(DeviceBinding::Full {
                active_devices: devices.len(),
            });
        }

        let row = replace_device(&mut *tx, session).await?;
        commit(tx).await?;
        Ok(DeviceBinding::Bound {
            session: row,
            reconnect,
        })
    }

    async fn remove_by_connection(
        &self,
        connection_id: ConnectionId,
    ) -> AppResult<Option<DeviceSession>> {
        sqlx::query_as::<_, DeviceSession>(
            "DELETE FROM device_sessions WHERE connection_id = $1 RETURNING *",
        )
        .bind(connection_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to remove session", e))
    }

    async fn touch(&self, connection_id: ConnectionId) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE device_sessions SET last_seen_at = NOW() WHERE connection_id = $1")
                .bind(connection_id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::with_source(ErrorKind::Database, "Failed to touch session", e)
                })?;
        Ok(result.rows_affected() > 0)
    }

    async fn remove_stale(
        &self,
        cutoff: DateTime<Utc>,
        live: &[ConnectionId],
    ) -> AppResult<Vec<DeviceSession>> {
        let live: Vec<Uuid> = live.iter().map(|id| id.into_uuid()).collect();

        sqlx::query_as::<_, DeviceSession>(
            "DELETE FROM device_sessions \
             WHERE last_seen_at < $1 AND NOT (connection_id = ANY($2)) RETURNING *",
        )
        .bind(cutoff)
        .bind(&live)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to remove stale sessions", e)
        })
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }
}
