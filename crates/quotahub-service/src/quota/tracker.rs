//! Quota tracker: lazy reset, limit evaluation and serialized increment.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, info};

use quotahub_core::config::QuotaConfig;
use quotahub_core::error::AppError;
use quotahub_core::lock::SubscriberLocks;
use quotahub_core::result::AppResult;
use quotahub_core::types::SubscriberId;
use quotahub_database::store::{SubscriberStore, UsageUpdate};
use quotahub_entity::subscriber::SubscriberWithPlan;

use super::outcome::{CompletionOutcome, QuotaSnapshot};

/// Tracks daily usage against plan limits.
///
/// The limit check and the increment are one atomic store operation, so
/// concurrent signals from several devices, in this process or another,
/// are counted exactly once each and never overshoot the limit.
#[derive(Debug, Clone)]
pub struct QuotaTracker {
    subscribers: Arc<dyn SubscriberStore>,
    locks: Arc<SubscriberLocks>,
    config: QuotaConfig,
}

impl QuotaTracker {
    /// Creates a new quota tracker.
    pub fn new(
        subscribers: Arc<dyn SubscriberStore>,
        locks: Arc<SubscriberLocks>,
        config: QuotaConfig,
    ) -> Self {
        Self {
            subscribers,
            locks,
            config,
        }
    }

    /// Quota state for a newly admitted connection, as of `today`.
    ///
    /// A counter left over from an earlier day is reset and persisted.
    pub async fn on_admission_at(
        &self,
        subscriber_id: SubscriberId,
        today: NaiveDate,
    ) -> AppResult<QuotaSnapshot> {
        let _guard = self.locks.acquire(subscriber_id).await;
        let mut record = self.load(subscriber_id).await?;

        if record.subscriber.reset_if_stale(today) {
            if self.subscribers.reset_stale_usage(subscriber_id, today).await? {
                debug!(subscriber_id = %subscriber_id, day = %today, "Daily usage reset");
            } else {
                // Another writer already moved the counter to today.
                record = self.load(subscriber_id).await?;
            }
        }

        let limits = record.limits(&self.config);
        let daily_usage = record.subscriber.effective_usage(today);

        Ok(QuotaSnapshot {
            daily_usage,
            daily_limit: limits.daily_limit,
            limit_reached: limits.is_exhausted_by(daily_usage),
            plan_name: limits.plan_name,
            first_name: record.subscriber.first_name().to_string(),
        })
    }

    /// Count one usage-completion signal against `today`.
    ///
    /// Refused without writing when the allowance is already used up;
    /// otherwise the counter grows by exactly one and is persisted.
    pub async fn record_completion_at(
        &self,
        subscriber_id: SubscriberId,
        today: NaiveDate,
    ) -> AppResult<CompletionOutcome> {
        let _guard = self.locks.acquire(subscriber_id).await;
        let limits = self.load(subscriber_id).await?.limits(&self.config);

        let daily_usage = match self
            .subscribers
            .consume_usage(subscriber_id, today, limits.daily_limit)
            .await?
        {
            UsageUpdate::Consumed(usage) => usage,
            UsageUpdate::Refused(usage) => {
                debug!(
                    subscriber_id = %subscriber_id,
                    daily_usage = usage,
                    daily_limit = limits.daily_limit,
                    "Usage signal refused, limit already reached"
                );
                return Ok(CompletionOutcome::Refused {
                    daily_usage: usage,
                    daily_limit: limits.daily_limit,
                });
            }
        };

        let reached = limits.is_exhausted_by(daily_usage);
        if reached {
            info!(
                subscriber_id = %subscriber_id,
                daily_limit = limits.daily_limit,
                "Daily limit reached"
            );
        }

        Ok(CompletionOutcome::Consumed {
            daily_usage,
            daily_limit: limits.daily_limit,
            reached,
        })
    }

    async fn load(&self, subscriber_id: SubscriberId) -> AppResult<SubscriberWithPlan> {
        self.subscribers
            .find_with_plan(subscriber_id)
            .await?
            .ok_or_else(|| AppError::not_found("Subscriber not found"))
    }
}
