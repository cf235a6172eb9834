//! WebSocket connection management: lifecycle, pool, handles, heartbeat, auth.

pub mod authenticator;
pub mod guard;
pub mod handle;
pub mod heartbeat;
pub mod manager;
pub mod pool;

pub use authenticator::{ConnectionAuthenticator, Handshake};
pub use guard::SessionGuard;
pub use handle::{ConnectionHandle, ConnectionState, Lifecycle, Outgoing};
pub use manager::{ConnectionManager, OpenConnection};
pub use pool::ConnectionPool;
