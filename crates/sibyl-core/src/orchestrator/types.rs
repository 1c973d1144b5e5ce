//! Orchestration outcome types

use crate::agents::AgentKind;
use crate::combiner::CombinedResult;
use crate::router::Strategy;
use serde::Serialize;

/// Terminal state of one plan step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    /// The agent produced a complete result
    Succeeded,
    /// The agent failed after its retry budget, or produced a partial result
    Failed,
    /// The step was never invoked: circuit open, redundant, or unregistered
    Skipped,
}

/// Per-step execution record, returned to the caller for observability
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// Agent the step addressed
    pub agent: AgentKind,
    /// Terminal state
    pub state: StepState,
    /// Invocation attempts made, 0 for skipped steps
    pub attempts: u32,
    /// Wall-clock time spent on the step
    pub latency_ms: u64,
    /// Failure reason or skip reason
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl StepRecord {
    pub(crate) fn skipped(agent: AgentKind, reason: impl Into<String>) -> Self {
        Self {
            agent,
            state: StepState::Skipped,
            attempts: 0,
            latency_ms: 0,
            detail: Some(reason.into()),
        }
    }
}

/// Whether the run satisfied every required capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestrationStatus {
    /// Every required field was produced
    Complete,
    /// Some required fields are missing, but at least one was produced
    Partial,
}

/// Full result of one orchestration run
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationOutcome {
    /// Merged response
    pub result: CombinedResult,
    /// Complete or partial
    pub status: OrchestrationStatus,
    /// Strategy the router chose
    pub strategy: Strategy,
    /// Router confidence in that choice
    pub routing_confidence: f64,
    /// Per-step execution records in plan order
    pub steps: Vec<StepRecord>,
    /// End-to-end duration
    pub duration_ms: u64,
}
