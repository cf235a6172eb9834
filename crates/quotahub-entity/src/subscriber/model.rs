//! Subscriber entity model.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use quotahub_core::config::QuotaConfig;
use quotahub_core::types::day::is_current_day;
use quotahub_core::types::{PlanId, QuotaLimits, SubscriberId};

use crate::plan::Plan;

/// An authenticated user of the service.
///
/// Identity fields and the credit balance belong to the external identity
/// store. `daily_usage` and `last_usage_date` are written only by the
/// quota tracker.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscriber {
    /// Unique subscriber identifier.
    pub id: SubscriberId,
    /// Full display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Prepaid credit balance.
    pub credits: i32,
    /// Assigned plan, if any.
    pub plan_id: Option<PlanId>,
    /// Usage-completion signals counted on `last_usage_date`.
    pub daily_usage: i32,
    /// UTC day the counter belongs to.
    pub last_usage_date: Option<NaiveDate>,
    /// When the subscriber was created.
    pub created_at: DateTime<Utc>,
    /// When the subscriber was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Subscriber {
    /// Build a fresh subscriber with no recorded usage.
    pub fn new(name: impl Into<String>, email: impl Into<String>, plan_id: Option<PlanId>) -> Self {
        let now = Utc::now();
        Self {
            id: SubscriberId::new(),
            name: name.into(),
            email: email.into(),
            credits: 0,
            plan_id,
            daily_usage: 0,
            last_usage_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Usage that counts against `today`'s allowance.
    ///
    /// A counter written on an earlier day reads as zero.
    pub fn effective_usage(&self, today: NaiveDate) -> u32 {
        if is_current_day(self.last_usage_date, today) {
            self.daily_usage.max(0) as u32
        } else {
            0
        }
    }

    /// Whether the stored counter belongs to an earlier day.
    pub fn usage_is_stale(&self, today: NaiveDate) -> bool {
        !is_current_day(self.last_usage_date, today)
    }

    /// Rewinds a stale counter to zero for `today`.
    ///
    /// Returns `true` if the record changed and must be persisted.
    pub fn reset_if_stale(&mut self, today: NaiveDate) -> bool {
        if !self.usage_is_stale(today) {
            return false;
        }
        self.daily_usage = 0;
        self.last_usage_date = Some(today);
        true
    }

    /// First whitespace-separated token of the display name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }
}

/// A subscriber joined with its plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriberWithPlan {
    /// The subscriber row.
    pub subscriber: Subscriber,
    /// The assigned plan, or `None` for the free tier.
    pub plan: Option<Plan>,
}

impl SubscriberWithPlan {
    /// Effective limits: the plan's, or the free-tier fallbacks.
    pub fn limits(&self, config: &QuotaConfig) -> QuotaLimits {
        match &self.plan {
            Some(plan) => QuotaLimits {
                max_devices: plan.max_devices(),
                daily_limit: plan.daily_limit(),
                plan_name: plan.name.clone(),
            },
            None => QuotaLimits::free_tier(config),
        }
    }

    /// The subscriber's identifier.
    pub fn id(&self) -> SubscriberId {
        self.subscriber.id
    }
}
