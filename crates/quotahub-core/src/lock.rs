//! Per-subscriber exclusive sections.
//!
//! Admission (count-then-upsert) and quota accounting (read-check-write)
//! both mutate state shared by every connection of one subscriber. Each
//! sequence runs while holding that subscriber's guard, so two devices of
//! the same subscriber are serialized while different subscribers never
//! contend.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

use crate::types::SubscriberId;

/// Guard proving exclusive access to one subscriber's mutable state.
///
/// Released on drop.
#[derive(Debug)]
pub struct SubscriberGuard {
    subscriber_id: SubscriberId,
    _guard: OwnedMutexGuard<()>,
}

impl SubscriberGuard {
    /// The subscriber this guard protects.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }
}

/// Table of lazily created per-subscriber mutexes.
#[derive(Debug, Default)]
pub struct SubscriberLocks {
    locks: DashMap<SubscriberId, Arc<Mutex<()>>>,
}

impl SubscriberLocks {
    /// Creates an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and takes the exclusive section of `subscriber_id`.
    pub async fn acquire(&self, subscriber_id: SubscriberId) -> SubscriberGuard {
        // Clone the Arc out so the shard lock is released before awaiting.
        let lock = self
            .locks
            .entry(subscriber_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        SubscriberGuard {
            subscriber_id,
            _guard: lock.lock_owned().await,
        }
    }

    /// Drops entries that nobody holds or waits on.
    ///
    /// Returns the number of entries removed.
    pub fn prune(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        let removed = before.saturating_sub(self.locks.len());
        if removed > 0 {
            debug!(removed = removed, "Pruned idle subscriber locks");
        }
        removed
    }

    /// Number of subscribers with a lock entry.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
