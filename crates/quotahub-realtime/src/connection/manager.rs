//! Connection manager: admission, quota signals and teardown for every
//! live connection.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use quotahub_auth::admission::{AdmissionDecision, DEVICE_LIMIT_MESSAGE, DeviceAdmissionController};
use quotahub_auth::context::ConnectionContext;
use quotahub_core::config::RealtimeConfig;
use quotahub_core::error::AppError;
use quotahub_core::result::AppResult;
use quotahub_core::types::utc_today;
use quotahub_service::quota::{CompletionOutcome, LIMIT_REACHED_MESSAGE, QuotaTracker};

use super::guard::SessionGuard;
use super::handle::{
    CLOSE_GOING_AWAY, ConnectionHandle, ConnectionState, Lifecycle, Outgoing,
};
use super::pool::ConnectionPool;
use crate::broadcast::UsageBroadcaster;
use crate::message::serializer;
use crate::message::types::{InboundMessage, OutboundMessage};
use crate::registry::session_registry::SessionRegistry;

/// An admitted connection, ready to be driven by the socket task.
#[derive(Debug)]
pub struct OpenConnection {
    /// Handle registered in the pool.
    pub handle: Arc<ConnectionHandle>,
    /// Frames queued for the socket writer, starting with the initial state.
    pub outbound: mpsc::Receiver<Outgoing>,
    /// Cleanup owner; release it when the socket closes.
    pub guard: SessionGuard,
}

/// Manages all active WebSocket connections.
#[derive(Debug)]
pub struct ConnectionManager {
    /// Connection pool.
    pool: Arc<ConnectionPool>,
    /// Session registry.
    registry: Arc<SessionRegistry>,
    /// Device admission.
    admission: DeviceAdmissionController,
    /// Daily quota accounting.
    quota: QuotaTracker,
    /// Usage fan-out.
    broadcaster: UsageBroadcaster,
    /// Configuration.
    config: RealtimeConfig,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    pub fn new(
        config: RealtimeConfig,
        pool: Arc<ConnectionPool>,
        registry: Arc<SessionRegistry>,
        admission: DeviceAdmissionController,
        quota: QuotaTracker,
        broadcaster: UsageBroadcaster,
    ) -> Self {
        Self {
            pool,
            registry,
            admission,
            quota,
            broadcaster,
            config,
        }
    }

    /// Admits an authenticated connection and queues its initial state.
    ///
    /// On success the handle is in the pool, the device is bound in the
    /// registry and the receiver already holds `limit_reached` (if the
    /// allowance is used up) followed by `init_state`. The initial frames
    /// are queued before the handle joins the pool, so no sibling update
    /// can overtake them. On failure the
    /// lifecycle ends in `Rejected` and nothing was written; a device-limit
    /// refusal surfaces as an `ErrorKind::DeviceLimit` error.
    pub async fn open(
        &self,
        ctx: ConnectionContext,
        lifecycle: Lifecycle,
    ) -> AppResult<OpenConnection> {
        let conn_id = lifecycle.conn_id();
        let subscriber_id = ctx.subscriber_id();

        let decision = match self.admission.admit(&ctx, conn_id).await {
            Ok(decision) => decision,
            Err(e) => {
                error!(
                    conn_id = %conn_id,
                    subscriber_id = %subscriber_id,
                    error = %e,
                    "Admission failed"
                );
                lifecycle.transition(ConnectionState::Rejected);
                return Err(e);
            }
        };

        let reconnect = match decision {
            AdmissionDecision::Admitted { reconnect, .. } => reconnect,
            AdmissionDecision::Rejected { .. } => {
                lifecycle.transition(ConnectionState::Rejected);
                return Err(AppError::device_limit(DEVICE_LIMIT_MESSAGE));
            }
        };
        lifecycle.transition(ConnectionState::Admitted);

        let (tx, rx) = mpsc::channel(self.config.channel_buffer_size.max(4));
        let handle = Arc::new(ConnectionHandle::new(
            lifecycle,
            subscriber_id,
            ctx.device_id.clone(),
            tx,
        ));
        let guard = SessionGuard::new(handle.clone(), self.pool.clone(), self.registry.clone());

        self.send_initial_state(&handle).await;
        self.pool.add(handle.clone());

        info!(
            conn_id = %conn_id,
            subscriber_id = %subscriber_id,
            device_id = %ctx.device_id,
            reconnect = reconnect,
            "WebSocket connection registered"
        );

        Ok(OpenConnection {
            handle,
            outbound: rx,
            guard,
        })
    }

    async fn send_initial_state(&self, handle: &ConnectionHandle) {
        let today = utc_today();
        match self.quota.on_admission_at(handle.subscriber_id, today).await {
            Ok(snapshot) => {
                handle.mark_usage(today, snapshot.daily_usage);
                if snapshot.limit_reached {
                    handle.send(OutboundMessage::limit_reached(LIMIT_REACHED_MESSAGE));
                }
                handle.send(OutboundMessage::InitState {
                    daily_usage: snapshot.daily_usage,
                    daily_limit: snapshot.daily_limit,
                    plan_name: snapshot.plan_name,
                    first_name: snapshot.first_name,
                });
            }
            Err(e) => {
                error!(
                    conn_id = %handle.id,
                    subscriber_id = %handle.subscriber_id,
                    error = %e,
                    "Failed to load initial quota state"
                );
                handle.send(OutboundMessage::error("Failed to load usage state"));
            }
        }
        handle.transition(ConnectionState::Active);
    }

    /// Processes a text frame from a client.
    pub async fn handle_inbound(&self, handle: &ConnectionHandle, raw_message: &str) {
        let msg = match serializer::decode(raw_message) {
            Ok(m) => m,
            Err(e) => {
                debug!(conn_id = %handle.id, error = %e, "Invalid inbound message");
                handle.send(OutboundMessage::error(e.message));
                return;
            }
        };

        match msg {
            InboundMessage::TaskComplete { .. } => self.on_task_complete(handle).await,
        }
    }

    /// Counts one usage-completion signal from `handle`.
    pub async fn on_task_complete(&self, handle: &ConnectionHandle) {
        if handle.state() != ConnectionState::Active {
            warn!(
                conn_id = %handle.id,
                state = ?handle.state(),
                "Usage signal on inactive connection ignored"
            );
            return;
        }

        let today = utc_today();
        match self.quota.record_completion_at(handle.subscriber_id, today).await {
            Ok(CompletionOutcome::Consumed {
                daily_usage,
                daily_limit,
                reached,
            }) => {
                handle.send_usage(today, daily_usage, daily_limit);
                self.broadcaster.fan_out(
                    handle.subscriber_id,
                    handle.id,
                    today,
                    daily_usage,
                    daily_limit,
                );
                if reached {
                    handle.send(OutboundMessage::limit_reached(LIMIT_REACHED_MESSAGE));
                }
            }
            Ok(CompletionOutcome::Refused { .. }) => {
                handle.send(OutboundMessage::limit_reached(LIMIT_REACHED_MESSAGE));
            }
            Err(e) => {
                error!(
                    conn_id = %handle.id,
                    subscriber_id = %handle.subscriber_id,
                    error = %e,
                    "Failed to record usage"
                );
                handle.send(OutboundMessage::error("Failed to record usage"));
            }
        }
    }

    /// Closes every live connection and removes its registry row.
    pub async fn close_all(&self) {
        let all = self.pool.all_connections();
        for conn in &all {
            conn.close(CLOSE_GOING_AWAY, "Server shutting down");
            conn.transition(ConnectionState::Disconnected);
            self.pool.remove(&conn.id);
            if let Err(e) = self.registry.remove(conn.id).await {
                error!(conn_id = %conn.id, error = %e, "Failed to remove session on shutdown");
            }
        }
        info!(count = all.len(), "All connections closed");
    }

    /// Returns the total connection count.
    pub fn connection_count(&self) -> usize {
        self.pool.connection_count()
    }

    /// Returns the number of unique connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.pool.subscriber_count()
    }

    /// Returns the realtime configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Returns a reference to the session registry.
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }
}
