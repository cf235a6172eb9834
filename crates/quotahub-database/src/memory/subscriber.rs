//! In-memory subscriber store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use dashmap::mapref::one::RefMut;

use quotahub_core::error::AppError;
use quotahub_core::result::AppResult;
use quotahub_core::types::{PlanId, SubscriberId};
use quotahub_entity::plan::Plan;
use quotahub_entity::subscriber::{Subscriber, SubscriberWithPlan};

use crate::store::{SubscriberStore, UsageUpdate};

/// Subscriber and plan tables held in process memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySubscriberStore {
    subscribers: Arc<DashMap<SubscriberId, Subscriber>>,
    plans: Arc<DashMap<PlanId, Plan>>,
    /// When set, every write fails with a database error.
    fail_writes: Arc<AtomicBool>,
}

impl MemorySubscriberStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a plan.
    pub fn insert_plan(&self, plan: Plan) -> PlanId {
        let id = plan.id;
        self.plans.insert(id, plan);
        id
    }

    /// Insert or replace a subscriber.
    pub fn insert_subscriber(&self, subscriber: Subscriber) -> SubscriberId {
        let id = subscriber.id;
        self.subscribers.insert(id, subscriber);
        id
    }

    /// Snapshot of a subscriber row.
    pub fn get(&self, id: SubscriberId) -> Option<Subscriber> {
        self.subscribers.get(&id).map(|s| s.value().clone())
    }

    /// Make subsequent writes fail, or succeed again.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> AppResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::database("Subscriber store is not accepting writes"));
        }
        Ok(())
    }

    fn entry_mut(&self, id: SubscriberId) -> AppResult<RefMut<'_, SubscriberId, Subscriber>> {
        self.subscribers
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Subscriber {id} not found")))
    }
}

#[async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn find_with_plan(&self, id: SubscriberId) -> AppResult<Option<SubscriberWithPlan>> {
        let Some(subscriber) = self.get(id) else {
            return Ok(None);
        };
        let plan = subscriber
            .plan_id
            .and_then(|plan_id| self.plans.get(&plan_id).map(|p| p.value().clone()));

        Ok(Some(SubscriberWithPlan { subscriber, plan }))
    }

    async fn reset_stale_usage(&self, id: SubscriberId, today: NaiveDate) -> AppResult<bool> {
        self.check_writable()?;
        let mut entry = self.entry_mut(id)?;
        let reset = entry.reset_if_stale(today);
        if reset {
            entry.updated_at = Utc::now();
        }
        Ok(reset)
    }

    async fn consume_usage(
        &self,
        id: SubscriberId,
        today: NaiveDate,
        daily_limit: u32,
    ) -> AppResult<UsageUpdate> {
        self.check_writable()?;
        // The shard write lock covers the check and the increment.
        let mut entry = self.entry_mut(id)?;
        let usage = entry.effective_usage(today);
        if usage >= daily_limit {
            return Ok(UsageUpdate::Refused(usage));
        }

        let next = usage + 1;
        entry.daily_usage = i32::try_from(next)
            .map_err(|_| AppError::validation(format!("Usage {next} out of range")))?;
        entry.last_usage_date = Some(today);
        entry.updated_at = Utc::now();
        Ok(UsageUpdate::Consumed(next))
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
