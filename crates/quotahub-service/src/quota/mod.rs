//! Daily usage quota.

pub mod outcome;
pub mod tracker;

pub use outcome::{CompletionOutcome, QuotaSnapshot};
pub use tracker::QuotaTracker;

/// Notification text sent when the daily allowance is used up.
pub const LIMIT_REACHED_MESSAGE: &str = "Daily limit reached.";
