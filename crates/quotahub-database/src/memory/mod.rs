//! DashMap-backed stores for single-process deployments and tests.

pub mod session;
pub mod subscriber;

pub use session::MemorySessionStore;
pub use subscriber::MemorySubscriberStore;
