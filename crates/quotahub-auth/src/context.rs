//! Authenticated handshake context.

use quotahub_core::config::QuotaConfig;
use quotahub_core::types::{QuotaLimits, SubscriberId};
use quotahub_entity::subscriber::SubscriberWithPlan;

/// Everything known about a connection once its credential checks out.
///
/// Built by the connection authenticator and passed by value into the
/// connection task; nothing else carries per-connection identity.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    /// The subscriber and their plan as of the handshake.
    pub subscriber: SubscriberWithPlan,
    /// Limits resolved from the plan or the free tier.
    pub limits: QuotaLimits,
    /// Client-supplied device identifier.
    pub device_id: String,
    /// Device metadata captured from the handshake.
    pub device_info: Option<serde_json::Value>,
}

impl ConnectionContext {
    /// Build a context, resolving limits against the free-tier fallbacks.
    pub fn new(
        subscriber: SubscriberWithPlan,
        device_id: impl Into<String>,
        device_info: Option<serde_json::Value>,
        quota: &QuotaConfig,
    ) -> Self {
        let limits = subscriber.limits(quota);
        Self {
            subscriber,
            limits,
            device_id: device_id.into(),
            device_info,
        }
    }

    /// The subscriber's identifier.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber.id()
    }
}
