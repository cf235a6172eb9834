//! Connection pool: tracks all live connections of this process.

use std::sync::Arc;

use dashmap::DashMap;

use quotahub_core::types::{ConnectionId, SubscriberId};

use super::handle::ConnectionHandle;

/// Thread-safe pool of all active WebSocket connections.
#[derive(Debug, Default)]
pub struct ConnectionPool {
    /// Subscriber ID → that subscriber's connections.
    by_subscriber: DashMap<SubscriberId, Vec<Arc<ConnectionHandle>>>,
    /// Connection ID → connection handle for direct lookup.
    by_id: DashMap<ConnectionId, Arc<ConnectionHandle>>,
}

impl ConnectionPool {
    /// Creates a new empty connection pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection to the pool.
    pub fn add(&self, handle: Arc<ConnectionHandle>) {
        self.by_id.insert(handle.id, handle.clone());
        self.by_subscriber
            .entry(handle.subscriber_id)
            .or_default()
            .push(handle);
    }

    /// Removes a connection from the pool.
    pub fn remove(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        let (_, handle) = self.by_id.remove(conn_id)?;
        if let Some(mut connections) = self.by_subscriber.get_mut(&handle.subscriber_id) {
            connections.retain(|c| c.id != *conn_id);
            if connections.is_empty() {
                drop(connections);
                self.by_subscriber
                    .remove_if(&handle.subscriber_id, |_, conns| conns.is_empty());
            }
        }
        Some(handle)
    }

    /// Gets a specific connection by ID.
    pub fn get(&self, conn_id: &ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.by_id.get(conn_id).map(|entry| entry.value().clone())
    }

    /// Gets all connections of a subscriber.
    pub fn subscriber_connections(&self, subscriber_id: &SubscriberId) -> Vec<Arc<ConnectionHandle>> {
        self.by_subscriber
            .get(subscriber_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Returns total number of active connections.
    pub fn connection_count(&self) -> usize {
        self.by_id.len()
    }

    /// Returns number of unique connected subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.by_subscriber.len()
    }

    /// Returns IDs of every connection in the pool.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.by_id.iter().map(|entry| *entry.key()).collect()
    }

    /// Returns all connection handles.
    pub fn all_connections(&self) -> Vec<Arc<ConnectionHandle>> {
        self.by_id
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}
