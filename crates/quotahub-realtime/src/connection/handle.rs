//! Individual WebSocket connection handle.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use quotahub_core::types::{ConnectionId, SubscriberId};

use crate::message::types::OutboundMessage;

/// WebSocket close code sent when a device is refused admission.
pub const CLOSE_DEVICE_LIMIT: u16 = 4009;

/// WebSocket close code sent when the server is shutting down.
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Lifecycle of one connection.
///
/// `Connecting → Authenticating → {Rejected | Admitted} → Active →
/// Disconnected`. `Rejected` and `Disconnected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ConnectionState {
    /// Transport accepted, nothing checked yet.
    Connecting = 0,
    /// Credentials are being validated.
    Authenticating = 1,
    /// Refused during the handshake or admission.
    Rejected = 2,
    /// Device bound in the session registry.
    Admitted = 3,
    /// Initial state delivered; accepting usage signals.
    Active = 4,
    /// Closed and removed from the registry.
    Disconnected = 5,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Authenticating,
            2 => Self::Rejected,
            3 => Self::Admitted,
            4 => Self::Active,
            _ => Self::Disconnected,
        }
    }

    /// Whether no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Rejected | Self::Disconnected)
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Connecting, Authenticating)
                | (Connecting | Authenticating | Admitted, Rejected)
                | (Authenticating, Admitted)
                | (Admitted, Active)
                | (Admitted | Active, Disconnected)
        )
    }
}

/// Atomically updated connection state.
#[derive(Debug)]
pub struct Lifecycle {
    conn_id: ConnectionId,
    state: AtomicU8,
}

impl Lifecycle {
    /// Starts a lifecycle in `Connecting`.
    pub fn new(conn_id: ConnectionId) -> Self {
        Self {
            conn_id,
            state: AtomicU8::new(ConnectionState::Connecting as u8),
        }
    }

    /// The connection this lifecycle belongs to.
    pub fn conn_id(&self) -> ConnectionId {
        self.conn_id
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Moves to `next` if legal. Returns `false` and leaves the state
    /// unchanged otherwise.
    pub fn transition(&self, next: ConnectionState) -> bool {
        let result = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                ConnectionState::from_u8(current)
                    .can_transition_to(next)
                    .then_some(next as u8)
            });

        match result {
            Ok(previous) => {
                trace!(
                    conn_id = %self.conn_id,
                    from = ?ConnectionState::from_u8(previous),
                    to = ?next,
                    "Connection state changed"
                );
                true
            }
            Err(current) => {
                trace!(
                    conn_id = %self.conn_id,
                    from = ?ConnectionState::from_u8(current),
                    to = ?next,
                    "Ignored illegal connection state change"
                );
                false
            }
        }
    }
}

/// Item queued for the socket writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// A JSON message frame.
    Message(OutboundMessage),
    /// A transport-level ping.
    Ping,
    /// Close the socket with the given code and reason.
    Close {
        /// WebSocket close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// A handle to a single admitted WebSocket connection.
///
/// Holds the sender channel for pushing frames to the socket writer, plus
/// the identity the connection was admitted with.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Subscriber who owns this connection.
    pub subscriber_id: SubscriberId,
    /// Device this connection is bound to.
    pub device_id: String,
    /// Sender for outbound frames.
    sender: mpsc::Sender<Outgoing>,
    /// When the connection was established.
    pub connected_at: DateTime<Utc>,
    /// Last pong received.
    last_pong: tokio::sync::RwLock<DateTime<Utc>>,
    /// Lifecycle state.
    lifecycle: Lifecycle,
    /// Newest `(day, usage)` queued to this connection.
    usage_mark: Mutex<Option<(NaiveDate, u32)>>,
}

impl ConnectionHandle {
    /// Creates a new connection handle.
    pub fn new(
        lifecycle: Lifecycle,
        subscriber_id: SubscriberId,
        device_id: String,
        sender: mpsc::Sender<Outgoing>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: lifecycle.conn_id(),
            subscriber_id,
            device_id,
            sender,
            connected_at: now,
            last_pong: tokio::sync::RwLock::new(now),
            lifecycle,
            usage_mark: Mutex::new(None),
        }
    }

    /// Queues a message. Returns `false` if it was dropped.
    pub fn send(&self, msg: OutboundMessage) -> bool {
        self.push(Outgoing::Message(msg))
    }

    /// Queues `update_usage` unless an equal or newer count for `day` (or a
    /// later day) was already queued. Returns `false` if nothing was queued.
    ///
    /// Counts only grow within a day, so this keeps the last value a client
    /// sees equal to the latest count even when updates race.
    pub fn send_usage(&self, day: NaiveDate, daily_usage: u32, daily_limit: u32) -> bool {
        let mut mark = self
            .usage_mark
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if mark.is_some_and(|seen| seen >= (day, daily_usage)) {
            trace!(conn_id = %self.id, daily_usage, "Dropped out-of-order usage update");
            return false;
        }
        let sent = self.send(OutboundMessage::update_usage(daily_usage, daily_limit));
        if sent {
            *mark = Some((day, daily_usage));
        }
        sent
    }

    /// Records a count the client already received in its initial state.
    pub fn mark_usage(&self, day: NaiveDate, daily_usage: u32) {
        let mut mark = self
            .usage_mark
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if mark.is_none_or(|seen| seen < (day, daily_usage)) {
            *mark = Some((day, daily_usage));
        }
    }

    /// Queues a transport ping.
    pub fn ping(&self) -> bool {
        self.push(Outgoing::Ping)
    }

    /// Asks the socket writer to close the connection.
    pub fn close(&self, code: u16, reason: impl Into<String>) -> bool {
        self.push(Outgoing::Close {
            code,
            reason: reason.into(),
        })
    }

    fn push(&self, item: Outgoing) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(item) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(conn_id = %self.id, "Connection send buffer full, dropping frame");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Whether the connection can still receive frames.
    pub fn is_alive(&self) -> bool {
        !self.lifecycle.state().is_terminal() && !self.sender.is_closed()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.lifecycle.state()
    }

    /// Moves the lifecycle to `next`.
    pub fn transition(&self, next: ConnectionState) -> bool {
        self.lifecycle.transition(next)
    }

    /// Records a pong response.
    pub async fn record_pong(&self) {
        *self.last_pong.write().await = Utc::now();
    }

    /// Time of the last pong (or of the connect, if none yet).
    pub async fn last_pong(&self) -> DateTime<Utc> {
        *self.last_pong.read().await
    }
}
