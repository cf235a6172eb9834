//! Fan-out of usage changes to a subscriber's other devices.

pub mod broadcaster;

pub use broadcaster::UsageBroadcaster;
