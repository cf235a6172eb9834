//! Values returned by the quota tracker.

use serde::{Deserialize, Serialize};

/// Quota state reported to a freshly admitted connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    /// Usage counted today, after any reset.
    pub daily_usage: u32,
    /// Today's allowance.
    pub daily_limit: u32,
    /// Name of the governing plan.
    pub plan_name: String,
    /// First token of the subscriber's display name.
    pub first_name: String,
    /// Whether the allowance is already used up.
    pub limit_reached: bool,
}

/// Result of one usage-completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The signal was counted.
    Consumed {
        /// Usage after the increment.
        daily_usage: u32,
        /// Today's allowance.
        daily_limit: u32,
        /// Whether this increment used up the allowance.
        reached: bool,
    },
    /// The allowance was already used up; nothing was written.
    Refused {
        /// Current usage.
        daily_usage: u32,
        /// Today's allowance.
        daily_limit: u32,
    },
}

impl CompletionOutcome {
    /// Usage after the signal was processed.
    pub fn daily_usage(&self) -> u32 {
        match self {
            Self::Consumed { daily_usage, .. } | Self::Refused { daily_usage, .. } => *daily_usage,
        }
    }

    /// The allowance in effect.
    pub fn daily_limit(&self) -> u32 {
        match self {
            Self::Consumed { daily_limit, .. } | Self::Refused { daily_limit, .. } => *daily_limit,
        }
    }
}
