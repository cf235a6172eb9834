//! Top-level real-time engine that ties together all subsystems.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use quotahub_auth::admission::DeviceAdmissionController;
use quotahub_auth::jwt::JwtDecoder;
use quotahub_core::config::AppConfig;
use quotahub_core::error::AppError;
use quotahub_core::lock::SubscriberLocks;
use quotahub_database::store::{SessionStore, SubscriberStore};
use quotahub_service::quota::QuotaTracker;

use crate::broadcast::UsageBroadcaster;
use crate::connection::authenticator::ConnectionAuthenticator;
use crate::connection::heartbeat::HeartbeatConfig;
use crate::connection::manager::ConnectionManager;
use crate::connection::pool::ConnectionPool;
use crate::registry::{RegistryReaper, SessionRegistry};

/// Central real-time engine that coordinates all WebSocket subsystems.
#[derive(Clone)]
pub struct RealtimeEngine {
    /// Handshake authenticator.
    pub authenticator: Arc<ConnectionAuthenticator>,
    /// Connection manager.
    pub connections: Arc<ConnectionManager>,
    /// Session registry.
    pub registry: Arc<SessionRegistry>,
    /// Subscriber stores, kept for health checks.
    subscribers: Arc<dyn SubscriberStore>,
    /// Stale-row reaper.
    reaper: RegistryReaper,
    /// Heartbeat settings for connection tasks.
    heartbeat: HeartbeatConfig,
    /// Cancels background tasks on shutdown.
    shutdown: CancellationToken,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine").finish()
    }
}

impl RealtimeEngine {
    /// Creates a new real-time engine with all subsystems.
    pub fn new(
        config: &AppConfig,
        subscribers: Arc<dyn SubscriberStore>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        let locks = Arc::new(SubscriberLocks::new());
        let pool = Arc::new(ConnectionPool::new());
        let registry = Arc::new(SessionRegistry::new(sessions.clone()));

        let authenticator = Arc::new(ConnectionAuthenticator::new(
            Arc::new(JwtDecoder::new(&config.auth)),
            subscribers.clone(),
            config.quota.clone(),
        ));
        let admission = DeviceAdmissionController::new(sessions, locks.clone());
        let quota = QuotaTracker::new(subscribers.clone(), locks.clone(), config.quota.clone());
        let broadcaster = UsageBroadcaster::new(registry.clone(), pool.clone());
        let connections = Arc::new(ConnectionManager::new(
            config.realtime.clone(),
            pool.clone(),
            registry.clone(),
            admission,
            quota,
            broadcaster,
        ));
        let reaper = RegistryReaper::new(registry.clone(), pool, locks, &config.realtime);

        info!("Real-time engine initialized");

        Self {
            authenticator,
            connections,
            registry,
            subscribers,
            reaper,
            heartbeat: HeartbeatConfig::from(&config.realtime),
            shutdown: CancellationToken::new(),
        }
    }

    /// Heartbeat settings for connection tasks.
    pub fn heartbeat_config(&self) -> HeartbeatConfig {
        self.heartbeat.clone()
    }

    /// Token cancelled when the engine shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Starts the registry reaper in the background.
    pub fn spawn_reaper(&self) -> JoinHandle<()> {
        tokio::spawn(self.reaper.clone().run(self.shutdown.child_token()))
    }

    /// Checks both stores. Returns `(subscribers_ok, sessions_ok)`.
    pub async fn health(&self) -> (bool, bool) {
        let subscribers = self.subscribers.health_check().await.unwrap_or(false);
        let sessions = self.registry.health_check().await.unwrap_or(false);
        (subscribers, sessions)
    }

    /// Initiates a graceful shutdown of the real-time engine.
    pub async fn shutdown(&self) -> Result<(), AppError> {
        info!("Shutting down real-time engine");

        self.shutdown.cancel();
        self.connections.close_all().await;

        info!("Real-time engine shut down");
        Ok(())
    }
}
