//! # quotahub-database
//!
//! PostgreSQL connection management, the store traits consumed by the
//! admission and quota logic, and their PostgreSQL and in-memory
//! implementations.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::{MemorySessionStore, MemorySubscriberStore};
pub use repositories::{SessionRepository, SubscriberRepository};
pub use store::{DeviceBinding, SessionStore, SubscriberStore, UsageUpdate};
