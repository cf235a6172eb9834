//! Convenience result type alias for QuotaHub.

use crate::error::AppError;

/// A specialized `Result` type for QuotaHub operations.
pub type AppResult<T> = Result<T, AppError>;
