//! Orchestration endpoints

use super::ApiResponse;
use crate::server::AppState;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use sibyl_core::{
    Capability, CombinedResult, Error, OrchestrationOutcome, OrchestrationStatus, QueryRequest,
    StepRecord, Strategy, UserContext,
};
use std::collections::HashSet;
use utoipa::ToSchema;
use uuid::Uuid;

/// Orchestration request payload
#[derive(Debug, Deserialize, ToSchema)]
pub struct OrchestrateRequest {
    /// Natural-language analytics question
    pub query: String,
    /// Caller context
    #[serde(default)]
    #[schema(value_type = Object)]
    pub user_context: UserContext,
    /// Capabilities the response must cover: "sql", "chart", "insights"
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub required_capabilities: Vec<Capability>,
}

/// Orchestration response payload
#[derive(Debug, Serialize, ToSchema)]
pub struct OrchestrateResponse {
    /// Request identifier, usable for feedback and cancellation
    pub request_id: Uuid,
    /// complete or partial
    #[schema(value_type = String)]
    pub status: OrchestrationStatus,
    /// Routing strategy used
    #[schema(value_type = String)]
    pub strategy: Strategy,
    /// Router confidence in the chosen strategy
    pub routing_confidence: f64,
    /// Merged agent outputs with confidence breakdown
    #[schema(value_type = Object)]
    pub result: CombinedResult,
    /// Per-step execution records
    #[schema(value_type = Vec<Object>)]
    pub steps: Vec<StepRecord>,
    /// End-to-end duration
    pub duration_ms: u64,
}

impl OrchestrateResponse {
    fn from_outcome(request_id: Uuid, outcome: OrchestrationOutcome) -> Self {
        Self {
            request_id,
            status: outcome.status,
            strategy: outcome.strategy,
            routing_confidence: outcome.routing_confidence,
            result: outcome.result,
            steps: outcome.steps,
            duration_ms: outcome.duration_ms,
        }
    }
}

/// Cancellation response payload
#[derive(Debug, Serialize, ToSchema)]
pub struct CancelResponse {
    /// Whether an in-flight execution was found and cancelled
    pub cancelled: bool,
}

/// Orchestration routes
pub fn orchestrate_routes() -> Router {
    Router::new()
        .route("/api/v1/orchestrate", post(orchestrate))
        .route("/api/v1/orchestrate/:id/cancel", post(cancel))
}

/// Run a query through the orchestrator
#[utoipa::path(
    post,
    path = "/api/v1/orchestrate",
    tag = "orchestrate",
    request_body = OrchestrateRequest,
    responses(
        (status = 200, description = "All required capabilities satisfied", body = OrchestrateResponse),
        (status = 207, description = "Partial result, some agents failed or were skipped", body = OrchestrateResponse),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "No agent produced a usable result")
    )
)]
pub async fn orchestrate(
    Extension(state): Extension<AppState>,
    Json(payload): Json<OrchestrateRequest>,
) -> Response {
    let capabilities: HashSet<Capability> = payload.required_capabilities.iter().copied().collect();

    let request = match QueryRequest::new(payload.query, payload.user_context, capabilities) {
        Ok(request) => request,
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ApiResponse::<OrchestrateResponse>::error(e.to_string())),
            )
                .into_response();
        }
    };
    let request_id = request.id;

    match state.orchestrator.process(request).await {
        Ok(outcome) => {
            let code = match outcome.status {
                OrchestrationStatus::Complete => StatusCode::OK,
                OrchestrationStatus::Partial => StatusCode::MULTI_STATUS,
            };
            (
                code,
                Json(ApiResponse::success(OrchestrateResponse::from_outcome(
                    request_id, outcome,
                ))),
            )
                .into_response()
        }
        Err(e @ (Error::Validation(_) | Error::NoCapabilities)) => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<OrchestrateResponse>::error(e.to_string())),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<OrchestrateResponse>::error(e.to_string())),
        )
            .into_response(),
    }
}

/// Cancel an in-flight orchestration run
#[utoipa::path(
    post,
    path = "/api/v1/orchestrate/{id}/cancel",
    tag = "orchestrate",
    params(("id" = Uuid, Path, description = "Request ID")),
    responses(
        (status = 200, description = "Cancellation outcome", body = CancelResponse)
    )
)]
pub async fn cancel(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> Json<ApiResponse<CancelResponse>> {
    let cancelled = state.orchestrator.cancel(id);
    Json(ApiResponse::success(CancelResponse { cancelled }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_deserializes_with_defaults() {
        let payload: OrchestrateRequest = serde_json::from_str(
            r#"{"query": "show revenue", "required_capabilities": ["sql", "chart"]}"#,
        )
        .unwrap();

        assert_eq!(payload.query, "show revenue");
        assert_eq!(
            payload.required_capabilities,
            vec![Capability::Sql, Capability::Chart]
        );
        assert!(payload.user_context.role.is_none());
    }

    #[test]
    fn test_unknown_capability_rejected() {
        let result: Result<OrchestrateRequest, _> = serde_json::from_str(
            r#"{"query": "show revenue", "required_capabilities": ["video"]}"#,
        );
        assert!(result.is_err());
    }
}
