//! # quotahub-auth
//!
//! Handshake credential validation and device admission for QuotaHub.
//!
//! ## Modules
//!
//! - `jwt`: HS256 token decoding (and encoding for tooling and tests)
//! - `admission`: per-subscriber device limit enforcement over the
//!   session registry

pub mod admission;
pub mod context;
pub mod jwt;

pub use admission::{AdmissionDecision, DeviceAdmissionController};
pub use context::ConnectionContext;
pub use jwt::{Claims, JwtDecoder, JwtEncoder};
