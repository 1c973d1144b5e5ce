//! Completion request and response types

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token usage information
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens
    pub prompt_tokens: u32,
    /// Completion tokens
    pub completion_tokens: u32,
    /// Total tokens
    pub total_tokens: u32,
}

/// Completion request
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// Model to use
    pub model: String,
    /// System instructions
    pub system: Option<String>,
    /// User prompt
    pub prompt: String,
    /// JSON schema the response should conform to. When set, the client asks
    /// the model for JSON output and attempts to parse the result into
    /// [`CompletionResponse::structured`].
    pub response_schema: Option<Value>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Temperature (0.0 - 2.0)
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// Create a new completion request
    #[must_use]
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    /// Set system instructions
    #[must_use]
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Request structured output conforming to a JSON schema
    #[must_use]
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    /// Set max tokens
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set temperature
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Raw generated text
    pub text: String,
    /// Parsed JSON output, present when the model returned valid JSON
    pub structured: Option<Value>,
    /// Token usage
    pub usage: Option<TokenUsage>,
    /// Model used
    pub model: String,
}

impl CompletionResponse {
    /// Whether the response carries parsed structured output
    #[must_use]
    pub fn is_structured(&self) -> bool {
        self.structured.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new("gpt-4o-mini", "Show sales by region")
            .with_system("You are a SQL generator")
            .with_response_schema(json!({"type": "object"}))
            .with_max_tokens(512)
            .with_temperature(0.2);

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.prompt, "Show sales by region");
        assert!(request.system.is_some());
        assert!(request.response_schema.is_some());
        assert_eq!(request.max_tokens, Some(512));
        assert_eq!(request.temperature, Some(0.2));
    }

    #[test]
    fn test_structured_flag() {
        let response = CompletionResponse {
            text: "{}".to_string(),
            structured: Some(json!({})),
            usage: None,
            model: "test".to_string(),
        };
        assert!(response.is_structured());
    }
}
