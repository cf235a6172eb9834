//! Core type definitions used across the QuotaHub workspace.

pub mod day;
pub mod id;
pub mod limits;

pub use day::utc_today;
pub use id::*;
pub use limits::QuotaLimits;
