//! LLM-backed agent executor

use super::{prompts, Agent, AgentDescriptor, AgentKind, AgentRequest, AgentResult};
use crate::error::{Error, Result};
use crate::feedback::FailureKind;
use crate::tuning::PromptTuning;
use serde_json::Value;
use sibyl_llm::{CompletionRequest, CompletionResponse, LlmClient};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Confidence reported when the model returned well-formed structured output
const CONFIDENCE_STRUCTURED: f64 = 0.9;
/// Confidence when JSON had to be extracted from surrounding prose
const CONFIDENCE_EXTRACTED: f64 = 0.7;
/// Confidence for a partial result missing some required fields
const CONFIDENCE_PARTIAL: f64 = 0.4;

const DEFAULT_TEMPERATURE: f32 = 0.2;
const DEFAULT_MAX_TOKENS: u32 = 1024;

/// An agent backed by a single LLM call.
///
/// One `LlmAgent` per [`AgentKind`] is registered with the orchestrator. The
/// executor renders the kind's prompt template, appends the active tuning
/// patch when tuning is enabled, and parses the model output into fields.
pub struct LlmAgent {
    descriptor: &'static AgentDescriptor,
    client: Arc<dyn LlmClient>,
    model: String,
    tuning: Arc<dyn PromptTuning>,
}

impl LlmAgent {
    /// Create an agent for the given kind
    #[must_use]
    pub fn new(
        kind: AgentKind,
        client: Arc<dyn LlmClient>,
        model: impl Into<String>,
        tuning: Arc<dyn PromptTuning>,
    ) -> Self {
        Self {
            descriptor: super::descriptor(kind),
            client,
            model: model.into(),
            tuning,
        }
    }

    fn system_prompt(&self) -> String {
        let mut system = prompts::system_prompt(self.descriptor.kind);
        if self.tuning.is_enabled() {
            if let Some(adjustment) = self.tuning.latest(self.descriptor.kind) {
                system.push_str("\n\n");
                system.push_str(&adjustment.patch);
            }
        }
        system
    }

    fn parse_response(&self, response: &CompletionResponse) -> Result<AgentResult> {
        let kind = self.descriptor.kind;

        // Prefer the provider-parsed structured payload; fall back to
        // extracting a JSON object out of prose. The fallback is a parse
        // strategy, not a retry: it happens inside the same invocation.
        let (value, confidence) = match &response.structured {
            Some(value) => (value.clone(), CONFIDENCE_STRUCTURED),
            None => match extract_json_object(&response.text) {
                Some(value) => {
                    debug!(agent = %kind, "structured parse failed, used extraction fallback");
                    (value, CONFIDENCE_EXTRACTED)
                }
                None => {
                    return Err(Error::Llm(sibyl_llm::Error::InvalidResponse(format!(
                        "agent {kind} output contained no JSON object"
                    ))));
                }
            },
        };

        let Value::Object(fields) = value else {
            return Err(Error::Llm(sibyl_llm::Error::InvalidResponse(format!(
                "agent {kind} output was not a JSON object"
            ))));
        };

        let missing: Vec<&str> = self
            .descriptor
            .required_fields
            .iter()
            .filter(|f| !fields.get(**f).is_some_and(|v| !v.is_null()))
            .copied()
            .collect();

        if missing.is_empty() {
            Ok(AgentResult {
                agent: kind,
                success: true,
                fields,
                confidence_raw: confidence,
                latency_ms: 0,
                error: None,
            })
        } else {
            // Deterministic outcome: retrying the same prompt will not grow
            // the missing fields back, so report a non-retryable partial
            // result and keep what was produced for downstream merging.
            warn!(agent = %kind, missing = ?missing, "agent output missing required fields");
            Ok(AgentResult {
                agent: kind,
                success: false,
                fields,
                confidence_raw: CONFIDENCE_PARTIAL,
                latency_ms: 0,
                error: Some(FailureKind::MissingFields),
            })
        }
    }
}

#[async_trait::async_trait]
impl Agent for LlmAgent {
    fn descriptor(&self) -> &'static AgentDescriptor {
        self.descriptor
    }

    async fn execute(&self, request: &AgentRequest) -> Result<AgentResult> {
        let start = Instant::now();
        let kind = self.descriptor.kind;

        let completion = CompletionRequest::new(
            self.model.clone(),
            prompts::build_prompt(kind, request),
        )
        .with_system(self.system_prompt())
        .with_response_schema(prompts::response_schema(kind))
        .with_max_tokens(DEFAULT_MAX_TOKENS)
        .with_temperature(DEFAULT_TEMPERATURE);

        let response = self.client.complete(completion).await?;

        let mut result = self.parse_response(&response)?;
        result.latency_ms = start.elapsed().as_millis() as u64;

        debug!(
            agent = %kind,
            request_id = %request.request_id,
            success = result.success,
            confidence = result.confidence_raw,
            latency_ms = result.latency_ms,
            "agent invocation finished"
        );

        Ok(result)
    }
}

/// Extract the outermost JSON object embedded in free-form text
#[must_use]
pub fn extract_json_object(text: &str) -> Option<Value> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::super::fields;
    use super::*;
    use crate::request::UserContext;
    use crate::tuning::NoopTuning;
    use serde_json::json;
    use sibyl_llm::Error as LlmError;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    struct ScriptedClient {
        responses: Mutex<Vec<sibyl_llm::Result<CompletionResponse>>>,
    }

    impl ScriptedClient {
        fn new(responses: Vec<sibyl_llm::Result<CompletionResponse>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }

        fn text(text: &str, structured: Option<Value>) -> CompletionResponse {
            CompletionResponse {
                text: text.to_string(),
                structured,
                usage: None,
                model: "scripted".to_string(),
            }
        }
    }

    #[async_trait::async_trait]
    impl LlmClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, _request: CompletionRequest) -> sibyl_llm::Result<CompletionResponse> {
            self.responses
                .lock()
                .await
                .pop()
                .unwrap_or_else(|| Err(LlmError::Api("script exhausted".into())))
        }
    }

    fn agent(kind: AgentKind, responses: Vec<sibyl_llm::Result<CompletionResponse>>) -> LlmAgent {
        LlmAgent::new(
            kind,
            Arc::new(ScriptedClient::new(responses)),
            "test-model",
            Arc::new(NoopTuning),
        )
    }

    fn request() -> AgentRequest {
        AgentRequest::new(Uuid::new_v4(), "revenue by region", UserContext::default())
    }

    #[tokio::test]
    async fn test_structured_output_high_confidence() {
        let payload = json!({"sql_query": "SELECT region, SUM(amount) FROM sales GROUP BY region"});
        let agent = agent(
            AgentKind::Sql,
            vec![Ok(ScriptedClient::text("{}", Some(payload)))],
        );

        let result = agent.execute(&request()).await.unwrap();
        assert!(result.success);
        assert!(result.has_field(fields::SQL_QUERY));
        assert!((result.confidence_raw - CONFIDENCE_STRUCTURED).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_extraction_fallback_lower_confidence() {
        let text = "Here is the query you asked for:\n{\"sql_query\": \"SELECT 1\"}\nEnjoy!";
        let agent = agent(AgentKind::Sql, vec![Ok(ScriptedClient::text(text, None))]);

        let result = agent.execute(&request()).await.unwrap();
        assert!(result.success);
        assert!((result.confidence_raw - CONFIDENCE_EXTRACTED).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_json_is_invalid_response() {
        let agent = agent(
            AgentKind::Sql,
            vec![Ok(ScriptedClient::text("I cannot help with that.", None))],
        );

        let err = agent.execute(&request()).await.unwrap_err();
        assert!(matches!(err, Error::Llm(LlmError::InvalidResponse(_))));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_missing_fields_is_nonretryable_partial() {
        // Unified output without executive_summary: partial, not an error.
        let payload = json!({
            "chart_config": {"chart_type": "bar"},
            "insights": ["sales are up"]
        });
        let agent = agent(
            AgentKind::Unified,
            vec![Ok(ScriptedClient::text("{}", Some(payload)))],
        );

        let result = agent.execute(&request()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.error, Some(FailureKind::MissingFields));
        assert!(result.has_field(fields::CHART_CONFIG));
        assert!(result.has_field(fields::INSIGHTS));
    }

    #[tokio::test]
    async fn test_llm_error_propagates() {
        let agent = agent(AgentKind::Chart, vec![Err(LlmError::RateLimited)]);
        let err = agent.execute(&request()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[test]
    fn test_extract_json_object() {
        assert_eq!(
            extract_json_object("noise {\"a\": 1} trailing"),
            Some(json!({"a": 1}))
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }
}
