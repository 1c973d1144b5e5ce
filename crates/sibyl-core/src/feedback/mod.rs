//! Append-only feedback store
//!
//! Every agent invocation outcome is recorded here, and user satisfaction
//! marks arrive later through the feedback endpoint. Quality metrics
//! (historical success rate, recent error kinds) are computed over a sliding
//! window at read time; records are never mutated. A request counts as failed
//! when its latest satisfaction mark says `satisfactory = false`, even if the
//! invocation itself succeeded.

mod memory;
mod sqlite;

pub use memory::MemoryFeedbackStore;
pub use sqlite::SqliteFeedbackStore;

use crate::agents::AgentKind;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classified failure cause for a recorded invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Call exceeded its deadline
    Timeout,
    /// Upstream returned 429
    RateLimited,
    /// Transport-level failure
    Network,
    /// Upstream 5xx or provider-side error
    Upstream,
    /// Model output could not be parsed as the expected structure
    InvalidJson,
    /// Structured output parsed but required fields were absent
    MissingFields,
    /// Request-level validation failure
    Validation,
    /// Skipped because the agent's circuit was open
    CircuitOpen,
}

impl FailureKind {
    /// Stable snake_case name used for storage and log fields
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timeout",
            FailureKind::RateLimited => "rate_limited",
            FailureKind::Network => "network",
            FailureKind::Upstream => "upstream",
            FailureKind::InvalidJson => "invalid_json",
            FailureKind::MissingFields => "missing_fields",
            FailureKind::Validation => "validation",
            FailureKind::CircuitOpen => "circuit_open",
        }
    }

    /// Parse a stored name back into a kind
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "timeout" => Some(FailureKind::Timeout),
            "rate_limited" => Some(FailureKind::RateLimited),
            "network" => Some(FailureKind::Network),
            "upstream" => Some(FailureKind::Upstream),
            "invalid_json" => Some(FailureKind::InvalidJson),
            "missing_fields" => Some(FailureKind::MissingFields),
            "validation" => Some(FailureKind::Validation),
            "circuit_open" => Some(FailureKind::CircuitOpen),
            _ => None,
        }
    }

    /// Classify a core error into a recordable failure kind
    #[must_use]
    pub fn from_error(error: &crate::error::Error) -> Self {
        use crate::error::Error;
        match error {
            Error::Deadline(_) => FailureKind::Timeout,
            Error::CircuitOpen(_) => FailureKind::CircuitOpen,
            Error::Validation(_) | Error::NoCapabilities => FailureKind::Validation,
            Error::Llm(e) => match e {
                sibyl_llm::Error::Timeout(_) => FailureKind::Timeout,
                sibyl_llm::Error::RateLimited => FailureKind::RateLimited,
                sibyl_llm::Error::Network(_) => FailureKind::Network,
                sibyl_llm::Error::Api(_) => FailureKind::Upstream,
                sibyl_llm::Error::InvalidResponse(_) => FailureKind::InvalidJson,
                sibyl_llm::Error::NotConfigured(_) => FailureKind::Validation,
            },
            _ => FailureKind::Upstream,
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded agent invocation outcome
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    /// Request this invocation belonged to
    pub request_id: Uuid,
    /// Agent that was invoked
    pub agent: AgentKind,
    /// Whether the invocation produced a usable result
    pub success: bool,
    /// Wall-clock latency of the invocation
    pub latency_ms: u64,
    /// Agent-reported confidence of the result (0 for failures)
    pub confidence: f64,
    /// Output fields present in the result
    pub fields_present: Vec<String>,
    /// Failure classification when `success` is false
    pub error: Option<FailureKind>,
    /// Recording time
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    /// Record for a successful invocation
    #[must_use]
    pub fn success(
        request_id: Uuid,
        agent: AgentKind,
        latency_ms: u64,
        confidence: f64,
        fields_present: Vec<String>,
    ) -> Self {
        Self {
            request_id,
            agent,
            success: true,
            latency_ms,
            confidence,
            fields_present,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Record for a failed invocation
    #[must_use]
    pub fn failure(request_id: Uuid, agent: AgentKind, latency_ms: u64, kind: FailureKind) -> Self {
        Self {
            request_id,
            agent,
            success: false,
            latency_ms,
            confidence: 0.0,
            fields_present: Vec::new(),
            error: Some(kind),
            timestamp: Utc::now(),
        }
    }
}

/// Sliding window bounding which records feed quality metrics
#[derive(Debug, Clone)]
pub struct FeedbackWindow {
    /// Maximum number of most-recent records considered
    pub max_records: usize,
    /// Maximum record age considered
    pub max_age: Duration,
}

impl Default for FeedbackWindow {
    fn default() -> Self {
        Self {
            max_records: 100,
            max_age: Duration::days(7),
        }
    }
}

impl FeedbackWindow {
    /// Earliest timestamp still inside the window
    #[must_use]
    pub fn cutoff(&self) -> DateTime<Utc> {
        Utc::now() - self.max_age
    }
}

/// Append-only store of invocation outcomes and satisfaction marks.
///
/// `record` and `record_satisfaction` are infallible from the caller's
/// perspective: implementations log storage errors and return. Orchestration
/// must never fail because bookkeeping did.
#[async_trait::async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Append an invocation outcome
    async fn record(&self, record: FeedbackRecord);

    /// Append a user satisfaction mark for a past request
    async fn record_satisfaction(&self, request_id: Uuid, satisfactory: bool);

    /// Windowed success rate for an agent. `None` when no records fall
    /// inside the window, so callers can apply a cold-start prior.
    async fn success_rate(&self, agent: AgentKind, window: &FeedbackWindow) -> Option<f64>;

    /// Failure kinds of windowed failed invocations, most recent first
    async fn recent_errors(&self, agent: AgentKind, window: &FeedbackWindow) -> Vec<FailureKind>;
}
