//! Periodic removal of orphaned session rows.
//!
//! A process that dies without running its disconnect path leaves rows
//! behind that would count against the device limit forever. Live
//! connections refresh their row on every heartbeat; rows that stop being
//! refreshed for longer than the TTL are deleted here.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use quotahub_core::config::RealtimeConfig;
use quotahub_core::lock::SubscriberLocks;
use quotahub_core::result::AppResult;

use super::session_registry::SessionRegistry;
use crate::connection::pool::ConnectionPool;

/// Background sweeper for stale registry rows and idle subscriber locks.
#[derive(Debug, Clone)]
pub struct RegistryReaper {
    registry: Arc<SessionRegistry>,
    pool: Arc<ConnectionPool>,
    locks: Arc<SubscriberLocks>,
    ttl: Duration,
    interval: Duration,
}

impl RegistryReaper {
    /// Creates a new reaper.
    pub fn new(
        registry: Arc<SessionRegistry>,
        pool: Arc<ConnectionPool>,
        locks: Arc<SubscriberLocks>,
        config: &RealtimeConfig,
    ) -> Self {
        Self {
            registry,
            pool,
            locks,
            ttl: config.session_ttl(),
            interval: config.reaper_interval(),
        }
    }

    /// Runs one sweep. Returns the number of rows removed.
    pub async fn sweep(&self) -> AppResult<usize> {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(ttl)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);
        let live = self.pool.connection_ids();

        let removed = self.registry.reap(cutoff, &live).await?;
        for row in &removed {
            warn!(
                subscriber_id = %row.subscriber_id,
                device_id = %row.device_id,
                conn_id = %row.connection_id,
                last_seen_at = %row.last_seen_at,
                "Reaped orphaned device session"
            );
        }

        self.locks.prune();
        Ok(removed.len())
    }

    /// Sweeps every interval until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            ttl_secs = self.ttl.as_secs(),
            "Registry reaper started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        error!(error = %e, "Registry reaper sweep failed");
                    }
                }
            }
        }

        info!("Registry reaper stopped");
    }
}
