//! # quotahub-api
//!
//! HTTP layer for QuotaHub: the WebSocket upgrade endpoint that feeds the
//! real-time engine, health checks, and the shared middleware stack.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
