//! Usage event broadcaster.

use std::sync::Arc;

use chrono::NaiveDate;
use tokio::task::JoinHandle;
use tracing::debug;

use quotahub_core::types::{ConnectionId, SubscriberId};

use crate::connection::pool::ConnectionPool;
use crate::message::types::OutboundMessage;
use crate::registry::session_registry::SessionRegistry;

/// Pushes `update_usage` to every other registered connection of a
/// subscriber.
///
/// Delivery is best effort: the caller never waits for it, and failures
/// are only logged. Fan-out tasks may finish in any order; each handle
/// drops counts older than the newest it has queued.
#[derive(Debug, Clone)]
pub struct UsageBroadcaster {
    registry: Arc<SessionRegistry>,
    pool: Arc<ConnectionPool>,
}

impl UsageBroadcaster {
    /// Creates a new broadcaster.
    pub fn new(registry: Arc<SessionRegistry>, pool: Arc<ConnectionPool>) -> Self {
        Self { registry, pool }
    }

    /// Spawns delivery of the count for `day` to all of `subscriber_id`'s
    /// registered connections except `origin`.
    ///
    /// The returned task resolves to the number of connections reached.
    pub fn fan_out(
        &self,
        subscriber_id: SubscriberId,
        origin: ConnectionId,
        day: NaiveDate,
        daily_usage: u32,
        daily_limit: u32,
    ) -> JoinHandle<usize> {
        let registry = self.registry.clone();
        let pool = self.pool.clone();

        tokio::spawn(async move {
            let sessions = match registry.list_sessions(subscriber_id).await {
                Ok(sessions) => sessions,
                Err(e) => {
                    debug!(
                        subscriber_id = %subscriber_id,
                        error = %e,
                        "Usage broadcast skipped, session lookup failed"
                    );
                    return 0;
                }
            };

            let mut delivered = 0;

            for session in sessions.iter().filter(|s| s.connection_id != origin) {
                match pool.get(&session.connection_id) {
                    Some(handle) if handle.send_usage(day, daily_usage, daily_limit) => {
                        delivered += 1
                    }
                    Some(_) => debug!(
                        conn_id = %session.connection_id,
                        "Usage update not delivered, superseded or closing"
                    ),
                    None => debug!(
                        conn_id = %session.connection_id,
                        device_id = %session.device_id,
                        "Usage update not delivered, connection not in this process"
                    ),
                }
            }

            debug!(
                subscriber_id = %subscriber_id,
                delivered = delivered,
                "Usage update broadcast"
            );
            delivered
        })
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::connection::handle::{ConnectionHandle, ConnectionState, Lifecycle, Outgoing};
    use quotahub_database::memory::MemorySessionStore;
    use quotahub_database::store::SessionStore;
    use quotahub_entity::session::NewDeviceSession;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 14).unwrap()
    }

    async fn register(
        store: &MemorySessionStore,
        pool: &ConnectionPool,
        subscriber_id: SubscriberId,
        device: &str,
    ) -> (ConnectionId, mpsc::Receiver<Outgoing>) {
        let conn = ConnectionId::new();
        store
            .upsert(&NewDeviceSession {
                subscriber_id,
                device_id: device.into(),
                connection_id: conn,
                device_info: None,
            })
            .await
            .unwrap();

        let (tx, rx) = mpsc::channel(8);
        let lifecycle = Lifecycle::new(conn);
        lifecycle.transition(ConnectionState::Authenticating);
        lifecycle.transition(ConnectionState::Admitted);
        pool.add(Arc::new(ConnectionHandle::new(
            lifecycle,
            subscriber_id,
            device.into(),
            tx,
        )));
        (conn, rx)
    }

    #[tokio::test]
    async fn test_fan_out_skips_origin_and_other_subscribers() {
        let store = MemorySessionStore::new();
        let pool = Arc::new(ConnectionPool::new());
        let sub = SubscriberId::new();
        let other = SubscriberId::new();

        let (origin, mut origin_rx) = register(&store, &pool, sub, "A").await;
        let (_, mut sibling_rx) = register(&store, &pool, sub, "B").await;
        let (_, mut stranger_rx) = register(&store, &pool, other, "A").await;

        let broadcaster = UsageBroadcaster::new(
            Arc::new(SessionRegistry::new(Arc::new(store.clone()))),
            pool,
        );
        let delivered = broadcaster
            .fan_out(sub, origin, day(), 3, 5)
            .await
            .unwrap();

        assert_eq!(delivered, 1);
        assert_eq!(
            sibling_rx.try_recv().unwrap(),
            Outgoing::Message(OutboundMessage::update_usage(3, 5))
        );
        assert!(origin_rx.try_recv().is_err());
        assert!(stranger_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fan_out_tolerates_remote_rows() {
        let store = MemorySessionStore::new();
        let pool = Arc::new(ConnectionPool::new());
        let sub = SubscriberId::new();
        store
            .upsert(&NewDeviceSession {
                subscriber_id: sub,
                device_id: "elsewhere".into(),
                connection_id: ConnectionId::new(),
                device_info: None,
            })
            .await
            .unwrap();

        let broadcaster = UsageBroadcaster::new(
            Arc::new(SessionRegistry::new(Arc::new(store))),
            pool,
        );
        let delivered = broadcaster
            .fan_out(sub, ConnectionId::new(), day(), 1, 5)
            .await
            .unwrap();
        assert_eq!(delivered, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_sibling_ends_on_latest_count() {
        let store = MemorySessionStore::new();
        let pool = Arc::new(ConnectionPool::new());
        let sub = SubscriberId::new();

        let (origin, _origin_rx) = register(&store, &pool, sub, "A").await;
        let (_, mut sibling_rx) = register(&store, &pool, sub, "B").await;

        let broadcaster = UsageBroadcaster::new(
            Arc::new(SessionRegistry::new(Arc::new(store.clone()))),
            pool,
        );

        // One simulated day per round, so every round starts from zero.
        for round in 0..50 {
            let today = day() + chrono::Duration::days(round);
            let tasks: Vec<_> = (1..=5)
                .map(|usage| broadcaster.fan_out(sub, origin, today, usage, 5))
                .collect();
            for task in tasks {
                task.await.unwrap();
            }

            let mut last = None;
            while let Ok(Outgoing::Message(msg)) = sibling_rx.try_recv() {
                last = Some(msg);
            }
            assert_eq!(last, Some(OutboundMessage::update_usage(5, 5)));
        }
    }
}
