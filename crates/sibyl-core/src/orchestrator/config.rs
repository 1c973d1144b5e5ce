//! Orchestrator configuration

use crate::combiner::ConfidenceWeights;
use crate::feedback::FeedbackWindow;
use crate::utils::{CircuitBreakerConfig, RetryConfig};
use std::time::Duration;

const DEFAULT_AGENT_DEADLINE: Duration = Duration::from_secs(30);

/// Tunables for plan execution
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Retry policy for transient agent failures
    pub retry: RetryConfig,
    /// Circuit breaker policy, applied per agent
    pub breaker: CircuitBreakerConfig,
    /// Confidence blend weights
    pub weights: ConfidenceWeights,
    /// Sliding window for historical quality metrics
    pub feedback_window: FeedbackWindow,
    /// Wall-clock deadline per agent invocation attempt
    pub agent_deadline: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            breaker: CircuitBreakerConfig::default(),
            weights: ConfidenceWeights::default(),
            feedback_window: FeedbackWindow::default(),
            agent_deadline: DEFAULT_AGENT_DEADLINE,
        }
    }
}

impl OrchestratorConfig {
    /// Create a configuration with defaults
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry policy
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the circuit breaker policy
    #[must_use]
    pub fn with_breaker(mut self, breaker: CircuitBreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }

    /// Set the confidence weights
    #[must_use]
    pub fn with_weights(mut self, weights: ConfidenceWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Set the feedback window
    #[must_use]
    pub fn with_feedback_window(mut self, window: FeedbackWindow) -> Self {
        self.feedback_window = window;
        self
    }

    /// Set the per-invocation deadline
    #[must_use]
    pub fn with_agent_deadline(mut self, deadline: Duration) -> Self {
        self.agent_deadline = deadline;
        self
    }
}
