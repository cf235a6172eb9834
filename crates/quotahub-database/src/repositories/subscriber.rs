//! Subscriber repository implementation.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::PgPool;

use quotahub_core::error::{AppError, ErrorKind};
use quotahub_core::result::AppResult;
use quotahub_core::types::{PlanId, SubscriberId};
use quotahub_entity::plan::Plan;
use quotahub_entity::subscriber::{Subscriber, SubscriberWithPlan};

use crate::store::{SubscriberStore, UsageUpdate};

/// PostgreSQL-backed subscriber lookups and quota writes.
#[derive(Debug, Clone)]
pub struct SubscriberRepository {
    pool: PgPool,
}

impl SubscriberRepository {
    /// Create a new subscriber repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a subscriber by primary key.
    pub async fn find_by_id(&self, id: SubscriberId) -> AppResult<Option<Subscriber>> {
        sqlx::query_as::<_, Subscriber>("SELECT * FROM subscribers WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to find subscriber by id", e)
            })
    }

    /// Find a plan by primary key.
    pub async fn find_plan(&self, plan_id: PlanId) -> AppResult<Option<Plan>> {
        sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = $1")
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find plan", e))
    }
}

#[async_trait]
impl SubscriberStore for SubscriberRepository {
    async fn find_with_plan(&self, id: SubscriberId) -> AppResult<Option<SubscriberWithPlan>> {
        let Some(subscriber) = self.find_by_id(id).await? else {
            return Ok(None);
        };

        let plan = match subscriber.plan_id {
            Some(plan_id) => self.find_plan(plan_id).await?,
            None => None,
        };

        Ok(Some(SubscriberWithPlan { subscriber, plan }))
    }

    async fn reset_stale_usage(&self, id: SubscriberId, today: NaiveDate) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE subscribers SET daily_usage = 0, last_usage_date = $2, updated_at = NOW() \
             WHERE id = $1 AND last_usage_date IS DISTINCT FROM $2",
        )
        .bind(id)
        .bind(today)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to reset usage", e))?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }
        match self.find_by_id(id).await? {
            Some(_) => Ok(false),
            None => Err(AppError::not_found(format!("Subscriber {id} not found"))),
        }
    }

    async fn consume_usage(
        &self,
        id: SubscriberId,
        today: NaiveDate,
        daily_limit: u32,
    ) -> AppResult<UsageUpdate> {
        let limit = i64::from(daily_limit);

        // Check and increment in one statement; the row lock serializes
        // concurrent writers from every process.
        let consumed = sqlx::query_scalar::<_, i32>(
            "UPDATE subscribers SET \
                 daily_usage = CASE WHEN last_usage_date = $2 THEN daily_usage + 1 ELSE 1 END, \
                 last_usage_date = $2, \
                 updated_at = NOW() \
             WHERE id = $1 \
               AND (CASE WHEN last_usage_date = $2 THEN daily_usage ELSE 0 END) < $3 \
             RETURNING daily_usage",
        )
        .bind(id)
        .bind(today)
        .bind(limit)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to record usage", e))?;

        if let Some(usage) = consumed {
            return Ok(UsageUpdate::Consumed(usage.max(0) as u32));
        }

        let current = sqlx::query_scalar::<_, i32>(
            "SELECT CASE WHEN last_usage_date = $2 THEN daily_usage ELSE 0 END \
             FROM subscribers WHERE id = $1",
        )
        .bind(id)
        .bind(today)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to read usage", e))?;

        match current {
            Some(usage) => Ok(UsageUpdate::Refused(usage.max(0) as u32)),
            None => Err(AppError::not_found(format!("Subscriber {id} not found"))),
        }
    }

    async fn health_check(&self) -> AppResult<bool> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }
}
