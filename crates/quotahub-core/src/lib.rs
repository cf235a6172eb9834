//! # quotahub-core
//!
//! Core crate for QuotaHub. Contains configuration schemas, typed
//! identifiers, quota limit resolution types, the per-subscriber lock
//! table, and the unified error system.
//!
//! This crate has **no** internal dependencies on other QuotaHub crates.

pub mod config;
pub mod error;
pub mod lock;
pub mod result;
pub mod types;

pub use error::AppError;
pub use lock::SubscriberLocks;
pub use result::AppResult;
