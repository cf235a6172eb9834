//! Device admission controller.

use std::sync::Arc;

use tracing::{debug, info, warn};

use quotahub_core::lock::SubscriberLocks;
use quotahub_core::result::AppResult;
use quotahub_core::types::ConnectionId;
use quotahub_database::store::{DeviceBinding, SessionStore};
use quotahub_entity::session::NewDeviceSession;

use super::decision::AdmissionDecision;
use crate::context::ConnectionContext;

/// Enforces the per-subscriber device limit over the session registry.
///
/// The store counts and binds in one atomic step, so two simultaneous
/// handshakes from different new devices cannot both observe a free slot.
/// The subscriber lock keeps handshakes in this process from queueing on
/// the store.
#[derive(Debug, Clone)]
pub struct DeviceAdmissionController {
    sessions: Arc<dyn SessionStore>,
    locks: Arc<SubscriberLocks>,
}

impl DeviceAdmissionController {
    /// Creates a new admission controller.
    pub fn new(sessions: Arc<dyn SessionStore>, locks: Arc<SubscriberLocks>) -> Self {
        Self { sessions, locks }
    }

    /// Admits or rejects the device in `ctx` for `connection_id`.
    ///
    /// A device that already holds a row is always admitted and its row is
    /// rebound to the new connection. A new device is admitted only while
    /// the subscriber has fewer distinct devices than the plan allows. On
    /// rejection nothing is written.
    pub async fn admit(
        &self,
        ctx: &ConnectionContext,
        connection_id: ConnectionId,
    ) -> AppResult<AdmissionDecision> {
        let subscriber_id = ctx.subscriber_id();
        let _guard = self.locks.acquire(subscriber_id).await;

        let binding = self
            .sessions
            .bind_device(
                &NewDeviceSession {
                    subscriber_id,
                    device_id: ctx.device_id.clone(),
                    connection_id,
                    device_info: ctx.device_info.clone(),
                },
                &ctx.limits,
            )
            .await?;

        let (session, reconnect) = match binding {
            DeviceBinding::Bound { session, reconnect } => (session, reconnect),
            DeviceBinding::Full { active_devices } => {
                warn!(
                    subscriber_id = %subscriber_id,
                    device_id = %ctx.device_id,
                    active_devices = active_devices,
                    max_devices = ctx.limits.max_devices,
                    "Device limit reached, rejecting connection"
                );
                return Ok(AdmissionDecision::Rejected {
                    active_devices,
                    max_devices: ctx.limits.max_devices,
                });
            }
        };

        if reconnect {
            debug!(
                subscriber_id = %subscriber_id,
                device_id = %ctx.device_id,
                conn_id = %connection_id,
                "Known device reconnected"
            );
        } else {
            info!(
                subscriber_id = %subscriber_id,
                device_id = %ctx.device_id,
                conn_id = %connection_id,
                "Device admitted"
            );
        }

        Ok(AdmissionDecision::Admitted { session, reconnect })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotahub_core::config::QuotaConfig;
    use quotahub_core::error::ErrorKind;
    use quotahub_database::memory::MemorySessionStore;
    use quotahub_entity::plan::Plan;
    use quotahub_entity::subscriber::{Subscriber, SubscriberWithPlan};

    fn context(subscriber: &SubscriberWithPlan, device: &str) -> ConnectionContext {
        ConnectionContext::new(subscriber.clone(), device, None, &QuotaConfig::default())
    }

    fn free_subscriber() -> SubscriberWithPlan {
        SubscriberWithPlan {
            subscriber: Subscriber::new("Ada", "ada@example.com", None),
            plan: None,
        }
    }

    fn plan_subscriber(max_devices: i32) -> SubscriberWithPlan {
        let plan = Plan::new("Duo", max_devices, 10);
        SubscriberWithPlan {
            subscriber: Subscriber::new("Ada", "ada@example.com", Some(plan.id)),
            plan: Some(plan),
        }
    }

    fn controller(store: &MemorySessionStore) -> DeviceAdmissionController {
        DeviceAdmissionController::new(Arc::new(store.clone()), Arc::new(SubscriberLocks::new()))
    }

    #[tokio::test]
    async fn test_free_tier_admits_one_device() {
        let store = MemorySessionStore::new();
        let ctl = controller(&store);
        let sub = free_subscriber();

        let first = ctl.admit(&context(&sub, "A"), ConnectionId::new()).await.unwrap();
        assert!(first.is_admitted());

        let second = ctl.admit(&context(&sub, "B"), ConnectionId::new()).await.unwrap();
        assert!(matches!(
            second,
            AdmissionDecision::Rejected {
                active_devices: 1,
                max_devices: 1
            }
        ));

        let err = second.into_result().unwrap_err();
        assert_eq!(err.kind, ErrorKind::DeviceLimit);
        assert_eq!(
            err.message,
            "Device limit reached. Please disconnect other devices."
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_known_device_is_readmitted_at_limit() {
        let store = MemorySessionStore::new();
        let ctl = controller(&store);
        let sub = free_subscriber();

        ctl.admit(&context(&sub, "A"), ConnectionId::new()).await.unwrap();
        let conn = ConnectionId::new();
        let again = ctl.admit(&context(&sub, "A"), conn).await.unwrap();

        match again {
            AdmissionDecision::Admitted { session, reconnect } => {
                assert!(reconnect);
                assert_eq!(session.connection_id, conn);
            }
            other => panic!("expected admission, got {other:?}"),
        }
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_plan_device_limit() {
        let store = MemorySessionStore::new();
        let ctl = controller(&store);
        let sub = plan_subscriber(2);

        for device in ["A", "B"] {
            assert!(
                ctl.admit(&context(&sub, device), ConnectionId::new())
                    .await
                    .unwrap()
                    .is_admitted()
            );
        }
        let third = ctl.admit(&context(&sub, "C"), ConnectionId::new()).await.unwrap();
        assert!(!third.is_admitted());
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_new_devices_never_exceed_limit() {
        let store = MemorySessionStore::new();
        let ctl = Arc::new(controller(&store));
        let sub = plan_subscriber(2);

        let mut tasks = Vec::new();
        for i in 0..10 {
            let ctl = ctl.clone();
            let ctx = context(&sub, &format!("device-{i}"));
            tasks.push(tokio::spawn(async move {
                ctl.admit(&ctx, ConnectionId::new()).await.unwrap()
            }));
        }

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap().is_admitted() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 2);
        assert_eq!(
            store.list_by_subscriber(sub.id()).await.unwrap().len(),
            2
        );
    }

    #[tokio::test]
    async fn test_controllers_sharing_a_store_never_exceed_limit() {
        let store = MemorySessionStore::new();
        // Separate lock tables, as in two server processes.
        let first = Arc::new(controller(&store));
        let second = Arc::new(controller(&store));
        let sub = plan_subscriber(1);

        let mut tasks = Vec::new();
        for i in 0..8 {
            let ctl = if i % 2 == 0 { first.clone() } else { second.clone() };
            let ctx = context(&sub, &format!("device-{i}"));
            tasks.push(tokio::spawn(async move {
                ctl.admit(&ctx, ConnectionId::new()).await.unwrap()
            }));
        }

        let mut admitted = 0;
        for task in tasks {
            if task.await.unwrap().is_admitted() {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 1);
        assert_eq!(store.len(), 1);
    }
}
