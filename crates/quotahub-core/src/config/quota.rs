//! Free-tier quota fallbacks applied to subscribers without a plan.

use serde::{Deserialize, Serialize};

/// Quota configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Daily usage allowance when no plan is assigned.
    #[serde(default = "default_free_daily_limit")]
    pub free_daily_limit: u32,
    /// Simultaneous devices allowed when no plan is assigned.
    #[serde(default = "default_free_max_devices")]
    pub free_max_devices: u32,
    /// Plan name reported to clients when no plan is assigned.
    #[serde(default = "default_free_plan_name")]
    pub free_plan_name: String,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            free_daily_limit: default_free_daily_limit(),
            free_max_devices: default_free_max_devices(),
            free_plan_name: default_free_plan_name(),
        }
    }
}

fn default_free_daily_limit() -> u32 {
    5
}

fn default_free_max_devices() -> u32 {
    1
}

fn default_free_plan_name() -> String {
    "Free Tier".to_string()
}
