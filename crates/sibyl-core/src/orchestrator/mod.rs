//! Orchestrator: plan execution with reliability controls
//!
//! Takes a validated request through routing, gated agent invocation
//! (circuit breaker, bounded retry, per-call deadline, cancellation), the
//! unified-first fallback path, result combination, and outcome recording.

mod config;
mod core;
mod process;
mod types;


pub use config::OrchestratorConfig;
pub use core::Orchestrator;
pub use types::{OrchestrationOutcome, OrchestrationStatus, StepRecord, StepState};
