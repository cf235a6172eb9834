//! Ping/pong heartbeat for WebSocket keepalive.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time;
use tracing::{debug, warn};

use quotahub_core::config::RealtimeConfig;

use super::handle::ConnectionHandle;
use crate::registry::session_registry::SessionRegistry;

/// Close code sent when a peer stops answering pings.
pub const CLOSE_HEARTBEAT_TIMEOUT: u16 = 4008;

/// Heartbeat configuration.
#[derive(Debug, Clone)]
pub struct HeartbeatConfig {
    /// Interval between pings.
    pub ping_interval: Duration,
    /// Timeout before considering connection dead.
    pub ping_timeout: Duration,
}

impl From<&RealtimeConfig> for HeartbeatConfig {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            ping_interval: config.ping_interval(),
            ping_timeout: config.ping_timeout(),
        }
    }
}

/// Runs the heartbeat loop for a connection.
///
/// Each tick checks the last pong, sends a ping and refreshes the
/// connection's registry row. Asks the writer to close the socket once the
/// peer has been silent for longer than the timeout.
pub async fn run_heartbeat(
    handle: Arc<ConnectionHandle>,
    registry: Arc<SessionRegistry>,
    config: HeartbeatConfig,
) {
    let mut interval = time::interval(config.ping_interval);

    loop {
        interval.tick().await;

        if !handle.is_alive() {
            break;
        }

        let silent_for = (Utc::now() - handle.last_pong().await)
            .to_std()
            .unwrap_or_default();
        if silent_for > config.ping_timeout {
            warn!(
                conn_id = %handle.id,
                silent_secs = silent_for.as_secs(),
                "Heartbeat timeout, closing connection"
            );
            handle.close(CLOSE_HEARTBEAT_TIMEOUT, "Heartbeat timeout");
            break;
        }

        if !handle.ping() {
            debug!(conn_id = %handle.id, "Ping not queued, stopping heartbeat");
            break;
        }

        match registry.touch(handle.id).await {
            Ok(true) => {}
            Ok(false) => debug!(conn_id = %handle.id, "No session row to refresh"),
            Err(e) => debug!(conn_id = %handle.id, error = %e, "Session refresh failed"),
        }
    }

    debug!(conn_id = %handle.id, "Heartbeat loop ended");
}
