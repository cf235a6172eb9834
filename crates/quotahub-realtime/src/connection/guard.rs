//! Guaranteed registry cleanup for admitted connections.

use std::sync::Arc;

use tracing::{error, warn};

use super::handle::{ConnectionHandle, ConnectionState};
use super::pool::ConnectionPool;
use crate::registry::session_registry::SessionRegistry;

/// Owns the cleanup of one admitted connection.
///
/// [`SessionGuard::release`] runs the cleanup on the normal path. If the
/// connection task ends any other way (panic, abort, early return) the
/// guard's `Drop` spawns the same cleanup, so the session row is removed on
/// every exit path.
#[derive(Debug)]
pub struct SessionGuard {
    handle: Arc<ConnectionHandle>,
    pool: Arc<ConnectionPool>,
    registry: Arc<SessionRegistry>,
    released: bool,
}

impl SessionGuard {
    pub(crate) fn new(
        handle: Arc<ConnectionHandle>,
        pool: Arc<ConnectionPool>,
        registry: Arc<SessionRegistry>,
    ) -> Self {
        Self {
            handle,
            pool,
            registry,
            released: false,
        }
    }

    /// The guarded connection.
    pub fn handle(&self) -> &Arc<ConnectionHandle> {
        &self.handle
    }

    /// Removes the connection from the pool and the registry.
    pub async fn release(mut self) {
        self.released = true;
        cleanup(self.handle.clone(), self.pool.clone(), self.registry.clone()).await;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }

        let handle = self.handle.clone();
        let pool = self.pool.clone();
        let registry = self.registry.clone();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(cleanup(handle, pool, registry));
            }
            Err(_) => {
                pool.remove(&handle.id);
                handle.transition(ConnectionState::Disconnected);
                warn!(
                    conn_id = %handle.id,
                    "Session guard dropped outside a runtime, row left for the reaper"
                );
            }
        }
    }
}

async fn cleanup(
    handle: Arc<ConnectionHandle>,
    pool: Arc<ConnectionPool>,
    registry: Arc<SessionRegistry>,
) {
    handle.transition(ConnectionState::Disconnected);
    pool.remove(&handle.id);

    if let Err(e) = registry.remove(handle.id).await {
        error!(
            conn_id = %handle.id,
            subscriber_id = %handle.subscriber_id,
            error = %e,
            "Failed to remove device session, row left for the reaper"
        );
    }
}
