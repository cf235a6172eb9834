//! # quotahub-service
//!
//! Quota accounting for QuotaHub. The tracker owns every write to a
//! subscriber's daily counter: lazy day-boundary reset, limit evaluation and
//! the serialized increment.
//!
//! Services follow constructor injection: all dependencies are provided
//! at construction time via `Arc` references.

pub mod quota;

pub use quota::{CompletionOutcome, QuotaSnapshot, QuotaTracker};
