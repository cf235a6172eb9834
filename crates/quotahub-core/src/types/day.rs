//! UTC calendar-day helpers for the daily quota window.

use chrono::{NaiveDate, Utc};

/// The current calendar date in UTC.
pub fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Whether a counter last written on `last_usage_date` still belongs to `today`.
///
/// A counter with no recorded date has never been used and is stale.
pub fn is_current_day(last_usage_date: Option<NaiveDate>, today: NaiveDate) -> bool {
    last_usage_date == Some(today)
}
