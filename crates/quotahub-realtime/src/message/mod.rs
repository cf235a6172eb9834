//! WebSocket message types and JSON framing.

pub mod serializer;
pub mod types;

pub use types::{InboundMessage, OutboundMessage};
