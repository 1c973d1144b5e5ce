//! Health endpoints
//!
//! - `/health` — liveness for load balancers
//! - `/health/detailed` — circuit breaker states, in-flight executions,
//!   tuning status
//! - `/api/v1/breakers/reset` — admin escape hatch forcing all circuits closed

use super::ApiResponse;
use crate::server::AppState;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use serde::Serialize;
use sibyl_core::utils::BreakerSnapshot;
use tracing::info;
use utoipa::ToSchema;

/// Simple health response
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Detailed health response
#[derive(Debug, Serialize, ToSchema)]
pub struct DetailedHealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Per-agent circuit breaker states
    #[schema(value_type = Vec<Object>)]
    pub breakers: Vec<BreakerSnapshot>,
    /// Orchestrations currently in flight
    pub active_executions: usize,
    /// Whether prompt tuning is active
    pub tuning_enabled: bool,
}

/// Health routes
pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/detailed", get(detailed_health_check))
        .route("/api/v1/breakers/reset", post(reset_breakers))
}

/// Simple health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Detailed health check with reliability state
#[utoipa::path(
    get,
    path = "/health/detailed",
    tag = "health",
    responses((status = 200, description = "Detailed health", body = DetailedHealthResponse))
)]
pub async fn detailed_health_check(
    Extension(state): Extension<AppState>,
) -> Json<DetailedHealthResponse> {
    Json(DetailedHealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        breakers: state.orchestrator.breaker_snapshot(),
        active_executions: state.orchestrator.active_count(),
        tuning_enabled: state.tuning.is_enabled(),
    })
}

/// Force every circuit breaker back to closed
#[utoipa::path(
    post,
    path = "/api/v1/breakers/reset",
    tag = "health",
    responses((status = 200, description = "Breakers reset"))
)]
pub async fn reset_breakers(Extension(state): Extension<AppState>) -> Json<ApiResponse<()>> {
    info!("resetting all circuit breakers");
    state.orchestrator.reset_breakers();
    Json(ApiResponse::success(()))
}
