//! Plan entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use quotahub_core::types::PlanId;

/// A purchasable tier.
///
/// Plans are created and edited by the external administration service;
/// this core only reads the device and daily limits.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    /// Unique plan identifier.
    pub id: PlanId,
    /// Display name.
    pub name: String,
    /// Price in the smallest currency unit.
    pub price: i32,
    /// ISO currency code.
    pub currency: String,
    /// Credits granted on purchase.
    pub credits: i32,
    /// Marketing feature list (JSON array).
    pub features: serde_json::Value,
    /// Maximum simultaneous devices.
    pub max_devices: i32,
    /// Daily usage allowance.
    pub daily_limit: i32,
    /// Days the plan lasts after purchase.
    pub duration_days: i32,
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// When the plan was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Build a plan with the given limits and empty commercial fields.
    pub fn new(name: impl Into<String>, max_devices: i32, daily_limit: i32) -> Self {
        let now = Utc::now();
        Self {
            id: PlanId::new(),
            name: name.into(),
            price: 0,
            currency: "INR".to_string(),
            credits: 0,
            features: serde_json::Value::Array(Vec::new()),
            max_devices,
            daily_limit,
            duration_days: 30,
            created_at: now,
            updated_at: now,
        }
    }

    /// Device limit, clamped to at least one device.
    pub fn max_devices(&self) -> u32 {
        self.max_devices.max(1) as u32
    }

    /// Daily limit, clamped to at least one use.
    pub fn daily_limit(&self) -> u32 {
        self.daily_limit.max(1) as u32
    }
}
