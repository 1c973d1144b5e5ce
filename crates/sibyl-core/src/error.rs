//! Error types for the orchestration engine

use crate::agents::AgentKind;
use thiserror::Error;

/// Core orchestration error type
#[derive(Error, Debug)]
pub enum Error {
    /// Request failed validation before any agent was invoked
    #[error("validation error: {0}")]
    Validation(String),

    /// The request declared no required capabilities, so no plan exists
    #[error("request declares no required capabilities")]
    NoCapabilities,

    /// The agent's circuit breaker is open and the call was not attempted
    #[error("circuit open for agent {0}")]
    CircuitOpen(AgentKind),

    /// An agent call exceeded its per-invocation deadline
    #[error("agent call exceeded {0}ms deadline")]
    Deadline(u64),

    /// The execution was cancelled before the agent call completed
    #[error("execution cancelled")]
    Cancelled,

    /// An agent kept failing after all retry attempts were spent
    #[error("agent {agent} failed after {attempts} attempt(s): {message}")]
    AgentExhausted {
        /// Agent that failed
        agent: AgentKind,
        /// Attempts made before giving up
        attempts: u32,
        /// Last error observed
        message: String,
    },

    /// No agent produced any field the request required
    #[error("no agent produced a required output field")]
    OrchestrationFailure,

    /// Error from the LLM layer
    #[error("llm error: {0}")]
    Llm(#[from] sibyl_llm::Error),

    /// Feedback store error
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Whether retrying the failed operation could plausibly succeed.
    ///
    /// Validation and parse failures are deterministic; repeating the same
    /// call burns budget without changing the outcome. Open circuits and
    /// cancellation are terminal for the current invocation as well.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Deadline(_) => true,
            Error::Llm(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
