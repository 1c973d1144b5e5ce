//! LLM client trait

use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::Result;

/// Trait for LLM clients.
///
/// Agent executors depend on this seam only; the concrete transport
/// (HTTP provider, scripted fake in tests) is injected at construction.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Get the client name
    fn name(&self) -> &str;

    /// Complete a prompt
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;
}
