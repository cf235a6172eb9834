//! HTTP routes.
//!
//! `GET /ws` upgrades to the real-time channel. Health probes live under
//! `/api`. Anything else gets a JSON 404.

use axum::routing::get;
use axum::{Router, middleware as axum_middleware};
use tower_http::trace::TraceLayer;

use quotahub_core::error::AppError;

use crate::error::ApiError;
use crate::handlers::{health, ws};
use crate::middleware::{cors, logging};
use crate::state::AppState;

/// Build the router with all routes and middleware attached.
pub fn build_router(state: AppState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::health))
        .route("/health/detailed", get(health::health_detailed));

    Router::new()
        .route("/ws", get(ws::ws_upgrade))
        .nest("/api", health_routes)
        .fallback(route_not_found)
        .layer(axum_middleware::from_fn(logging::request_logging))
        .layer(cors::build_cors_layer(&state.config.server.cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    AppError::not_found("No such route").into()
}
