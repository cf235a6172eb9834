//! # quotahub-realtime
//!
//! Real-time WebSocket engine for QuotaHub. Provides:
//!
//! - Handshake authentication of subscribers and devices
//! - Per-connection lifecycle with device admission and quota accounting
//! - The persisted session registry and its stale-row reaper
//! - Fan-out of usage updates to a subscriber's other devices
//! - Ping/pong heartbeats

pub mod broadcast;
pub mod connection;
pub mod message;
pub mod registry;
pub mod server;

pub use broadcast::UsageBroadcaster;
pub use connection::authenticator::ConnectionAuthenticator;
pub use connection::manager::ConnectionManager;
pub use registry::{RegistryReaper, SessionRegistry};
pub use server::RealtimeEngine;
