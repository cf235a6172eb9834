//! Liveness and readiness probes.

use axum::Json;
use axum::extract::State;

use crate::dto::response::{ApiResponse, DetailedHealthResponse, HealthResponse, ServiceStatus};
use crate::state::AppState;

/// GET /api/health
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: ServiceStatus::Ok,
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.started_at.elapsed().as_secs(),
    }))
}

/// GET /api/health/detailed
///
/// Probes both stores and reports this process's live connections.
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Json<ApiResponse<DetailedHealthResponse>> {
    let (subscribers_ok, sessions_ok) = state.realtime.health().await;
    let connections = &state.realtime.connections;

    Json(ApiResponse::ok(DetailedHealthResponse {
        status: if subscribers_ok && sessions_ok {
            ServiceStatus::Ok
        } else {
            ServiceStatus::Degraded
        },
        subscriber_store: subscribers_ok.into(),
        session_store: sessions_ok.into(),
        ws_connections: connections.connection_count(),
        online_subscribers: connections.subscriber_count(),
    }))
}
