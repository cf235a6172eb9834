//! Effective quota limits for a subscriber.

use serde::{Deserialize, Serialize};

use crate::config::QuotaConfig;

/// Resolved limits that govern one subscriber.
///
/// Limits come from the assigned plan, or from the free-tier fallbacks in
/// [`QuotaConfig`] when no plan is assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaLimits {
    /// Maximum number of distinct devices with a live session.
    pub max_devices: u32,
    /// Maximum usage-completion signals per UTC day.
    pub daily_limit: u32,
    /// Display name of the governing plan.
    pub plan_name: String,
}

impl QuotaLimits {
    /// Free-tier limits from configuration.
    pub fn free_tier(config: &QuotaConfig) -> Self {
        Self {
            max_devices: config.free_max_devices,
            daily_limit: config.free_daily_limit,
            plan_name: config.free_plan_name.clone(),
        }
    }

    /// Check whether `usage` has used up the daily allowance.
    pub fn is_exhausted_by(&self, usage: u32) -> bool {
        usage >= self.daily_limit
    }

    /// Check whether `distinct_devices` already fills every device slot.
    pub fn devices_full(&self, distinct_devices: usize) -> bool {
        distinct_devices >= self.max_devices as usize
    }
}
