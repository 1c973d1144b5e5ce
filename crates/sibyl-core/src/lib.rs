//! Sibyl Core - Orchestration Engine
//!
//! This crate provides the orchestration and reliability layer for the Sibyl
//! analytics service:
//! - Router: analyzing a natural-language query and producing an execution plan
//! - Agents: LLM-backed executors for SQL, chart, insight, and unified generation
//! - Orchestrator: plan execution with circuit-breaker, retry, and fallback
//! - Combiner: merging agent outputs and calibrating confidence from history
//! - Feedback: append-only outcome store consumed by quality metrics and tuning
//! - Tuning: optional feedback-driven prompt adjustment
//! - Utils: circuit breaker and retry utilities

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agents;
pub mod combiner;
pub mod error;
pub mod feedback;
pub mod orchestrator;
pub mod request;
pub mod router;
pub mod tuning;
pub mod utils;

pub use agents::{
    registry, Agent, AgentDescriptor, AgentKind, AgentRequest, AgentResult, LlmAgent,
};
pub use combiner::{
    CombinedResult, ConfidenceWeights, GenerationMethod, QualityBreakdown, ResultCombiner,
};
pub use error::{Error, Result};
pub use feedback::{
    FailureKind, FeedbackRecord, FeedbackStore, FeedbackWindow, MemoryFeedbackStore,
    SqliteFeedbackStore,
};
pub use orchestrator::{
    Orchestrator, OrchestratorConfig, OrchestrationOutcome, OrchestrationStatus, StepRecord,
    StepState,
};
pub use request::{Capability, ExpertiseLevel, QueryRequest, UserContext};
pub use router::{ContextAnalyzer, ExecutionPlan, Strategy};
pub use tuning::{HeuristicTuning, NoopTuning, PromptAdjustment, PromptTuning};
pub use utils::{
    retry_with_backoff, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry,
    CircuitState, RetryConfig, RetryError,
};
