//! PostgreSQL store implementations.

pub mod session;
pub mod subscriber;

pub use session::SessionRepository;
pub use subscriber::SubscriberRepository;
