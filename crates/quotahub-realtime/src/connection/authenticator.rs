//! WebSocket handshake authentication.
//!
//! Validates the bearer token and device identifier supplied at connect
//! time and resolves the subscriber with their plan. Admission is decided
//! later, by the connection manager.

use std::sync::Arc;

use tracing::debug;

use quotahub_auth::context::ConnectionContext;
use quotahub_auth::jwt::JwtDecoder;
use quotahub_core::config::QuotaConfig;
use quotahub_core::error::AppError;
use quotahub_database::store::SubscriberStore;

use super::handle::{ConnectionState, Lifecycle};

/// Credentials and metadata presented with a connection attempt.
#[derive(Debug, Clone, Default)]
pub struct Handshake {
    /// Bearer token.
    pub token: Option<String>,
    /// Client-supplied device identifier.
    pub device_id: Option<String>,
    /// `User-Agent` header of the upgrade request.
    pub user_agent: Option<String>,
}

impl Handshake {
    /// Device metadata recorded with the session row.
    pub fn device_info(&self) -> serde_json::Value {
        serde_json::json!({ "userAgent": self.user_agent })
    }
}

/// Authenticates WebSocket connections using JWT tokens.
#[derive(Clone)]
pub struct ConnectionAuthenticator {
    /// JWT decoder.
    decoder: Arc<JwtDecoder>,
    /// Subscriber lookups.
    subscribers: Arc<dyn SubscriberStore>,
    /// Free-tier fallbacks for subscribers without a plan.
    quota: QuotaConfig,
}

impl std::fmt::Debug for ConnectionAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionAuthenticator").finish()
    }
}

impl ConnectionAuthenticator {
    /// Creates a new authenticator.
    pub fn new(
        decoder: Arc<JwtDecoder>,
        subscribers: Arc<dyn SubscriberStore>,
        quota: QuotaConfig,
    ) -> Self {
        Self {
            decoder,
            subscribers,
            quota,
        }
    }

    /// Validates `handshake` and resolves the subscriber.
    ///
    /// Moves `lifecycle` to `Authenticating`, and to `Rejected` on failure.
    pub async fn authenticate(
        &self,
        handshake: &Handshake,
        lifecycle: &Lifecycle,
    ) -> Result<ConnectionContext, AppError> {
        lifecycle.transition(ConnectionState::Authenticating);

        let result = self.resolve(handshake).await;
        if let Err(e) = &result {
            debug!(
                conn_id = %lifecycle.conn_id(),
                kind = %e.kind,
                reason = %e.message,
                "Handshake rejected"
            );
            lifecycle.transition(ConnectionState::Rejected);
        }
        result
    }

    async fn resolve(&self, handshake: &Handshake) -> Result<ConnectionContext, AppError> {
        let token = non_blank(handshake.token.as_deref())
            .ok_or_else(|| AppError::authentication("Authentication error: No token provided"))?;
        let device_id = handshake
            .device_id
            .as_deref()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AppError::missing_device("Device ID required"))?;

        let claims = self.decoder.decode(token).map_err(|e| {
            debug!(reason = %e.message, "Token rejected");
            AppError::authentication("Authentication error: Invalid token")
        })?;

        let subscriber = self
            .subscribers
            .find_with_plan(claims.subscriber_id())
            .await?
            .ok_or_else(|| AppError::authentication("User not found"))?;

        Ok(ConnectionContext::new(
            subscriber,
            device_id,
            Some(handshake.device_info()),
            &self.quota,
        ))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
