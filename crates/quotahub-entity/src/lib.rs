//! # quotahub-entity
//!
//! Domain entity models for QuotaHub. Every struct in this crate
//! represents a database table row or a domain value object. Database
//! entities derive `sqlx::FromRow`.

pub mod plan;
pub mod session;
pub mod subscriber;
