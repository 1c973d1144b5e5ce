//! OpenAPI document

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use super::feedback::{FeedbackAck, FeedbackSubmission};
use super::health::{DetailedHealthResponse, HealthResponse};
use super::orchestrate::{CancelResponse, OrchestrateRequest, OrchestrateResponse};

/// OpenAPI specification for the Sibyl API
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sibyl API",
        description = "AI analytics orchestration service",
    ),
    paths(
        super::orchestrate::orchestrate,
        super::orchestrate::cancel,
        super::feedback::submit_feedback,
        super::health::health_check,
        super::health::detailed_health_check,
        super::health::reset_breakers,
    ),
    components(schemas(
        OrchestrateRequest,
        OrchestrateResponse,
        CancelResponse,
        FeedbackSubmission,
        FeedbackAck,
        HealthResponse,
        DetailedHealthResponse,
    )),
    tags(
        (name = "orchestrate", description = "Query orchestration"),
        (name = "feedback", description = "User satisfaction feedback"),
        (name = "health", description = "Liveness and reliability state"),
    )
)]
pub struct ApiDoc;

/// Documentation routes
pub fn docs_routes() -> Router {
    Router::new().route("/api/v1/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["paths"]["/api/v1/orchestrate"].is_object());
        assert!(json["paths"]["/api/v1/feedback"].is_object());
    }
}
