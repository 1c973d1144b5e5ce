//! Web API for Sibyl
//!
//! Endpoints:
//! - `POST /api/v1/orchestrate` — run a query through the orchestrator
//! - `POST /api/v1/orchestrate/{id}/cancel` — cancel an in-flight run
//! - `POST /api/v1/feedback` — submit satisfaction feedback (always 202)
//! - `GET  /health`, `GET /health/detailed` — liveness and breaker states
//! - `POST /api/v1/breakers/reset` — force all circuits closed
//! - `GET  /api/v1/openapi.json` — OpenAPI document

pub mod docs;
pub mod feedback;
pub mod health;
pub mod orchestrate;

#[cfg(test)]
mod tests;

use axum::Router;
use serde::Serialize;
use utoipa::ToSchema;

pub use docs::docs_routes;
pub use feedback::feedback_routes;
pub use health::health_routes;
pub use orchestrate::orchestrate_routes;

/// API response wrapper
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> ApiResponse<T> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(orchestrate_routes())
        .merge(feedback_routes())
        .merge(health_routes())
        .merge(docs_routes())
}
