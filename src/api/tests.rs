//! Router-level tests: status mapping and response envelopes

use super::*;
use crate::server::AppState;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Extension;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use sibyl_core::{
    Agent, AgentDescriptor, AgentKind, AgentRequest, AgentResult, CircuitBreakerConfig,
    FailureKind, FeedbackStore, MemoryFeedbackStore, NoopTuning, Orchestrator, OrchestratorConfig,
    RetryConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Deterministic agent: full output for its kind, or a terminal failure.
struct ScriptedAgent {
    descriptor: &'static AgentDescriptor,
    fail: bool,
}

impl ScriptedAgent {
    fn ok(kind: AgentKind) -> Arc<Self> {
        Arc::new(Self {
            descriptor: sibyl_core::agents::descriptor(kind),
            fail: false,
        })
    }

    fn failing(kind: AgentKind) -> Arc<Self> {
        Arc::new(Self {
            descriptor: sibyl_core::agents::descriptor(kind),
            fail: true,
        })
    }
}

#[async_trait::async_trait]
impl Agent for ScriptedAgent {
    fn descriptor(&self) -> &'static AgentDescriptor {
        self.descriptor
    }

    async fn execute(&self, _request: &AgentRequest) -> sibyl_core::Result<AgentResult> {
        let kind = self.descriptor.kind;
        if self.fail {
            return Ok(AgentResult::failure(kind, 5, FailureKind::Upstream));
        }

        let mut fields = serde_json::Map::new();
        for field in self.descriptor.required_fields {
            let value = match *field {
                "sql_query" => json!("SELECT region, SUM(amount) FROM sales GROUP BY region"),
                "chart_config" => json!({"chart_type": "bar", "x_axis": "region"}),
                "insights" => json!(["west region leads revenue"]),
                _ => json!("Revenue is concentrated in the west."),
            };
            fields.insert((*field).to_string(), value);
        }
        Ok(AgentResult {
            agent: kind,
            success: true,
            fields,
            confidence_raw: 0.9,
            latency_ms: 5,
            error: None,
        })
    }
}

fn test_state(agents: Vec<Arc<dyn Agent>>) -> AppState {
    let feedback: Arc<dyn FeedbackStore> = Arc::new(MemoryFeedbackStore::new());
    let config = OrchestratorConfig::new()
        .with_retry(
            RetryConfig::new()
                .with_max_attempts(1)
                .with_base_backoff(Duration::from_millis(1)),
        )
        .with_breaker(CircuitBreakerConfig::new().with_failure_threshold(10))
        .with_agent_deadline(Duration::from_secs(5));

    let mut orchestrator = Orchestrator::new(feedback.clone(), config).unwrap();
    for agent in agents {
        orchestrator = orchestrator.with_agent(agent);
    }

    AppState {
        orchestrator: Arc::new(orchestrator),
        feedback,
        tuning: Arc::new(NoopTuning),
    }
}

fn app(state: AppState) -> Router {
    api_router().layer(Extension(state))
}

async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_owned()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_orchestrate_complete_returns_200() {
    let app = app(test_state(vec![ScriptedAgent::ok(AgentKind::Sql)]));

    let (status, body) = post_json(
        app,
        "/api/v1/orchestrate",
        r#"{"query": "total revenue by region", "required_capabilities": ["sql"]}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "complete");
    assert!(body["data"]["result"]["sql_query"].is_string());
}

#[tokio::test]
async fn test_orchestrate_partial_returns_207() {
    let app = app(test_state(vec![
        ScriptedAgent::ok(AgentKind::Sql),
        ScriptedAgent::failing(AgentKind::Chart),
    ]));

    let (status, body) = post_json(
        app,
        "/api/v1/orchestrate",
        r#"{"query": "revenue snapshot", "required_capabilities": ["sql", "chart"]}"#,
    )
    .await;

    assert_eq!(status, StatusCode::MULTI_STATUS);
    assert_eq!(body["data"]["status"], "partial");
    assert!(body["data"]["result"]["sql_query"].is_string());
    assert!(body["data"]["result"].get("chart_config").is_none());
}

#[tokio::test]
async fn test_orchestrate_empty_query_returns_400() {
    let app = app(test_state(vec![ScriptedAgent::ok(AgentKind::Sql)]));

    let (status, body) = post_json(
        app,
        "/api/v1/orchestrate",
        r#"{"query": "   ", "required_capabilities": ["sql"]}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_orchestrate_no_capabilities_returns_400() {
    let app = app(test_state(vec![ScriptedAgent::ok(AgentKind::Sql)]));

    let (status, body) = post_json(
        app,
        "/api/v1/orchestrate",
        r#"{"query": "total revenue"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_feedback_unknown_request_returns_202() {
    let app = app(test_state(Vec::new()));

    let (status, body) = post_json(
        app,
        "/api/v1/feedback",
        r#"{"request_id": "550e8400-e29b-41d4-a716-446655440000", "satisfactory": false}"#,
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["accepted"], true);
}

#[tokio::test]
async fn test_feedback_malformed_body_still_returns_202() {
    let app = app(test_state(Vec::new()));

    let (status, body) = post_json(app, "/api/v1/feedback", r#"{"request_id": 42"#).await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["accepted"], false);
}

#[test]
fn test_success_response_shape() {
    let response = ApiResponse::success(7);
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], 7);
    assert!(json.get("error").is_none());
}

#[test]
fn test_error_response_shape() {
    let response: ApiResponse<()> = ApiResponse::error("boom");
    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "boom");
    assert!(json.get("data").is_none());
}
