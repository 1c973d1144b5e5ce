//! Feedback endpoint
//!
//! Accepts user satisfaction marks. Recording is append-only and best-effort:
//! the endpoint answers 202 regardless of what happens downstream, so callers
//! never couple their flow to feedback bookkeeping.

use super::ApiResponse;
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Extension, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// Satisfaction feedback payload
#[derive(Debug, Deserialize, ToSchema)]
pub struct FeedbackSubmission {
    /// Orchestration request the feedback is about
    pub request_id: Uuid,
    /// Whether the user found the response satisfactory
    pub satisfactory: bool,
    /// Optional free-form comment, currently logged only
    #[serde(default)]
    pub comment: Option<String>,
}

/// Acknowledgement payload
#[derive(Debug, Serialize, ToSchema)]
pub struct FeedbackAck {
    /// Whether the payload was understood and queued
    pub accepted: bool,
}

/// Feedback routes
pub fn feedback_routes() -> Router {
    Router::new().route("/api/v1/feedback", post(submit_feedback))
}

/// Submit satisfaction feedback for a past request
#[utoipa::path(
    post,
    path = "/api/v1/feedback",
    tag = "feedback",
    request_body = FeedbackSubmission,
    responses(
        (status = 202, description = "Feedback accepted", body = FeedbackAck)
    )
)]
pub async fn submit_feedback(
    Extension(state): Extension<AppState>,
    payload: Result<Json<FeedbackSubmission>, JsonRejection>,
) -> (StatusCode, Json<ApiResponse<FeedbackAck>>) {
    let Json(submission) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            // Feedback must never fail the caller, malformed bodies included.
            warn!(error = %rejection, "unparseable feedback payload dropped");
            return (
                StatusCode::ACCEPTED,
                Json(ApiResponse::success(FeedbackAck { accepted: false })),
            );
        }
    };

    debug!(
        request_id = %submission.request_id,
        satisfactory = submission.satisfactory,
        has_comment = submission.comment.is_some(),
        "feedback received"
    );

    let store = state.feedback.clone();
    tokio::spawn(async move {
        store
            .record_satisfaction(submission.request_id, submission.satisfactory)
            .await;
    });

    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::success(FeedbackAck { accepted: true })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_deserializes() {
        let payload: FeedbackSubmission = serde_json::from_str(
            r#"{"request_id": "550e8400-e29b-41d4-a716-446655440000", "satisfactory": false}"#,
        )
        .unwrap();
        assert!(!payload.satisfactory);
        assert!(payload.comment.is_none());
    }
}
