//! Real-time WebSocket engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Real-time (WebSocket) engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Per-connection outbound buffer size.
    #[serde(default = "default_channel_buffer")]
    pub channel_buffer_size: usize,
    /// WebSocket ping interval in seconds.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_seconds: u64,
    /// Seconds without a pong before the connection is dropped.
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout_seconds: u64,
    /// Seconds after which a session row that has not been touched is
    /// considered orphaned and eligible for reaping.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,
    /// Interval between registry reaper runs, in seconds.
    #[serde(default = "default_reaper_interval")]
    pub reaper_interval_seconds: u64,
}

impl RealtimeConfig {
    /// Reject timer settings of zero seconds.
    pub fn validate(&self) -> Result<(), AppError> {
        let timers = [
            ("ping_interval_seconds", self.ping_interval_seconds),
            ("ping_timeout_seconds", self.ping_timeout_seconds),
            ("session_ttl_seconds", self.session_ttl_seconds),
            ("reaper_interval_seconds", self.reaper_interval_seconds),
        ];
        match timers.iter().find(|(_, secs)| *secs == 0) {
            Some((name, _)) => Err(AppError::configuration(format!(
                "realtime.{name} must be at least 1"
            ))),
            None => Ok(()),
        }
    }

    /// Ping interval as a [`Duration`]. Never zero.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_seconds.max(1))
    }

    /// Pong timeout as a [`Duration`].
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_secs(self.ping_timeout_seconds)
    }

    /// Session TTL as a [`Duration`].
    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_seconds)
    }

    /// Reaper interval as a [`Duration`].
    pub fn reaper_interval(&self) -> Duration {
        Duration::from_secs(self.reaper_interval_seconds.max(1))
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            channel_buffer_size: default_channel_buffer(),
            ping_interval_seconds: default_ping_interval(),
            ping_timeout_seconds: default_ping_timeout(),
            session_ttl_seconds: default_session_ttl(),
            reaper_interval_seconds: default_reaper_interval(),
        }
    }
}

fn default_channel_buffer() -> usize {
    64
}

fn default_ping_interval() -> u64 {
    25
}

fn default_ping_timeout() -> u64 {
    60
}

fn default_session_ttl() -> u64 {
    180
}

fn default_reaper_interval() -> u64 {
    60
}
