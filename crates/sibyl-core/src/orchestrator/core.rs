//! Orchestrator construction and execution tracking

use super::OrchestratorConfig;
use crate::agents::{Agent, AgentKind};
use crate::combiner::ResultCombiner;
use crate::error::Result;
use crate::feedback::FeedbackStore;
use crate::router::ContextAnalyzer;
use crate::utils::{BreakerSnapshot, CircuitBreakerRegistry};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

/// Executes routed plans against registered agents with reliability controls
pub struct Orchestrator {
    pub(crate) agents: HashMap<AgentKind, Arc<dyn Agent>>,
    pub(crate) analyzer: ContextAnalyzer,
    pub(crate) breakers: Arc<CircuitBreakerRegistry>,
    pub(crate) feedback: Arc<dyn FeedbackStore>,
    pub(crate) combiner: ResultCombiner,
    pub(crate) config: OrchestratorConfig,
    pub(crate) active: Arc<DashMap<Uuid, CancellationToken>>,
}

impl Orchestrator {
    /// Create an orchestrator. Fails when the configured confidence weights
    /// are invalid.
    pub fn new(
        feedback: Arc<dyn FeedbackStore>,
        config: OrchestratorConfig,
    ) -> Result<Self> {
        let combiner = ResultCombiner::new(
            config.weights.clone(),
            config.feedback_window.clone(),
            feedback.clone(),
        )?;

        Ok(Self {
            agents: HashMap::new(),
            analyzer: ContextAnalyzer::new(),
            breakers: Arc::new(CircuitBreakerRegistry::new(config.breaker.clone())),
            feedback,
            combiner,
            config,
            active: Arc::new(DashMap::new()),
        })
    }

    /// Register an agent. Replaces any agent of the same kind.
    #[must_use]
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        let kind = agent.descriptor().kind;
        self.agents.insert(kind, agent);
        self
    }

    /// Cancel an in-flight execution. Returns false when the request is not
    /// currently running.
    pub fn cancel(&self, request_id: Uuid) -> bool {
        match self.active.get(&request_id) {
            Some(token) => {
                info!(%request_id, "cancelling execution");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of executions currently in flight
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Current circuit breaker states, for the health surface
    #[must_use]
    pub fn breaker_snapshot(&self) -> Vec<BreakerSnapshot> {
        self.breakers.snapshot()
    }

    /// Reset every circuit breaker to closed
    pub fn reset_breakers(&self) {
        self.breakers.reset_all();
    }
}
