//! Plan execution

use super::core::Orchestrator;
use super::types::{OrchestrationOutcome, OrchestrationStatus, StepRecord, StepState};
use crate::agents::{fields, AgentKind, AgentRequest, AgentResult};
use crate::error::{Error, Result};
use crate::feedback::{FailureKind, FeedbackRecord};
use crate::request::{Capability, QueryRequest};
use crate::router::{ExecutionPlan, Strategy};
use crate::utils::retry_with_backoff;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

impl Orchestrator {
    /// Run a request end to end: route, execute, combine, record.
    ///
    /// Returns `Err` only when nothing usable was produced; partial coverage
    /// comes back as `Ok` with [`OrchestrationStatus::Partial`].
    pub async fn process(&self, request: QueryRequest) -> Result<OrchestrationOutcome> {
        let token = CancellationToken::new();
        self.active.insert(request.id, token.clone());

        let result = self.run(&request, &token).await;
        self.active.remove(&request.id);

        if let Err(e) = &result {
            warn!(request_id = %request.id, error = %e, "orchestration failed");
        }
        result
    }

    async fn run(
        &self,
        request: &QueryRequest,
        token: &CancellationToken,
    ) -> Result<OrchestrationOutcome> {
        let started = Instant::now();
        let plan = self.analyzer.route(request)?;

        info!(
            request_id = %request.id,
            strategy = %plan.strategy,
            steps = ?plan.steps,
            routing_confidence = plan.routing_confidence,
            "executing plan"
        );

        let mut base =
            AgentRequest::new(request.id, request.text.clone(), request.user_context.clone());

        let (steps, results) = match plan.strategy {
            Strategy::Sequential => self.run_sequential(&plan, &mut base, token).await,
            Strategy::Parallel => self.run_parallel(&plan, &mut base, token).await,
            Strategy::Collaborative => self.run_collaborative(&plan, &mut base, token).await,
        };

        self.record_outcomes(request.id, &results);

        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let required = required_fields(&request.required_capabilities);
        let produced_any = results
            .iter()
            .any(|r| required.iter().any(|f| r.has_field(f)));
        if !produced_any {
            return Err(Error::OrchestrationFailure);
        }

        let combined = self.combiner.combine(request.id, &results, &required).await;
        let status = if combined.quality.missing_fields.is_empty() {
            OrchestrationStatus::Complete
        } else {
            OrchestrationStatus::Partial
        };

        Ok(OrchestrationOutcome {
            result: combined,
            status,
            strategy: plan.strategy,
            routing_confidence: plan.routing_confidence,
            steps,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    async fn run_sequential(
        &self,
        plan: &ExecutionPlan,
        base: &mut AgentRequest,
        token: &CancellationToken,
    ) -> (Vec<StepRecord>, Vec<AgentResult>) {
        let mut steps = Vec::with_capacity(plan.steps.len());
        let mut results = Vec::new();

        for kind in &plan.steps {
            let (record, result) = self.invoke(*kind, base, token).await;
            absorb_context(base, result.as_ref());
            steps.push(record);
            if let Some(result) = result {
                results.push(result);
            }
            if token.is_cancelled() {
                break;
            }
        }

        (steps, results)
    }

    async fn run_parallel(
        &self,
        plan: &ExecutionPlan,
        base: &mut AgentRequest,
        token: &CancellationToken,
    ) -> (Vec<StepRecord>, Vec<AgentResult>) {
        let mut steps = Vec::with_capacity(plan.steps.len());
        let mut results = Vec::new();
        let mut remaining = plan.steps.clone();

        // SQL is the shared dependency; everything after it runs concurrently.
        if remaining.first() == Some(&AgentKind::Sql) {
            remaining.remove(0);
            let (record, result) = self.invoke(AgentKind::Sql, base, token).await;
            absorb_context(base, result.as_ref());
            steps.push(record);
            if let Some(result) = result {
                results.push(result);
            }
        }

        let ctx: &AgentRequest = base;
        let outcomes =
            futures::future::join_all(remaining.iter().map(|k| self.invoke(*k, ctx, token)))
                .await;
        for (record, result) in outcomes {
            steps.push(record);
            if let Some(result) = result {
                results.push(result);
            }
        }

        (steps, results)
    }

    /// Unified-first execution: one LLM call covers chart, insights, and
    /// summary. Only when that call fails, comes back partial, or its circuit
    /// is open do the separate agents run, and then concurrently. At most two
    /// generation calls ever happen for the chart+insights pair.
    async fn run_collaborative(
        &self,
        plan: &ExecutionPlan,
        base: &mut AgentRequest,
        token: &CancellationToken,
    ) -> (Vec<StepRecord>, Vec<AgentResult>) {
        let mut steps = Vec::with_capacity(plan.steps.len());
        let mut results = Vec::new();

        if plan.steps.first() == Some(&AgentKind::Sql) {
            let (record, result) = self.invoke(AgentKind::Sql, base, token).await;
            absorb_context(base, result.as_ref());
            steps.push(record);
            if let Some(result) = result {
                results.push(result);
            }
        }

        let (record, result) = self.invoke(AgentKind::Unified, base, token).await;
        let unified_full = result.as_ref().is_some_and(|r| r.success);
        steps.push(record);
        if let Some(result) = result {
            results.push(result);
        }

        if unified_full {
            steps.push(StepRecord::skipped(
                AgentKind::Chart,
                "covered by unified result",
            ));
            steps.push(StepRecord::skipped(
                AgentKind::Insights,
                "covered by unified result",
            ));
        } else {
            info!(
                request_id = %base.request_id,
                "unified agent unavailable or partial, falling back to separate agents"
            );
            let ctx: &AgentRequest = base;
            let (chart, insights) = tokio::join!(
                self.invoke(AgentKind::Chart, ctx, token),
                self.invoke(AgentKind::Insights, ctx, token)
            );
            for (record, result) in [chart, insights] {
                steps.push(record);
                if let Some(result) = result {
                    results.push(result);
                }
            }
        }

        (steps, results)
    }

    /// One gated invocation: circuit admission, per-attempt deadline,
    /// cancellation, bounded retry of transient failures.
    async fn invoke(
        &self,
        kind: AgentKind,
        request: &AgentRequest,
        token: &CancellationToken,
    ) -> (StepRecord, Option<AgentResult>) {
        let Some(agent) = self.agents.get(&kind) else {
            return (StepRecord::skipped(kind, "agent not registered"), None);
        };

        let breaker = self.breakers.breaker(kind);
        if !breaker.can_execute() {
            warn!(agent = %kind, request_id = %request.request_id, "circuit open, skipping agent");
            return (StepRecord::skipped(kind, "circuit open"), None);
        }

        let deadline = self.config.agent_deadline;
        let attempts = AtomicU32::new(0);
        let started = Instant::now();

        let outcome = retry_with_backoff(
            &self.config.retry,
            || {
                let agent = Arc::clone(agent);
                let breaker = Arc::clone(&breaker);
                let attempts = &attempts;
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    if token.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    // The breaker can trip mid-retry; re-check per attempt.
                    if !breaker.can_execute() {
                        return Err(Error::CircuitOpen(kind));
                    }

                    let result = tokio::select! {
                        () = token.cancelled() => Err(Error::Cancelled),
                        res = timeout(deadline, agent.execute(request)) => match res {
                            Ok(inner) => inner,
                            Err(_) => Err(Error::Deadline(deadline.as_millis() as u64)),
                        },
                    };

                    match result {
                        Ok(result) => {
                            if result.success {
                                breaker.record_success();
                            } else {
                                breaker.record_failure();
                            }
                            Ok(result)
                        }
                        Err(e) => {
                            if !matches!(e, Error::Cancelled | Error::CircuitOpen(_)) {
                                breaker.record_failure();
                            }
                            Err(e)
                        }
                    }
                }
            },
            |e| e.is_transient(),
        )
        .await;

        let latency_ms = started.elapsed().as_millis() as u64;
        let attempts = attempts.load(Ordering::SeqCst);

        match outcome {
            Ok(result) => {
                let state = if result.success {
                    StepState::Succeeded
                } else {
                    StepState::Failed
                };
                let record = StepRecord {
                    agent: kind,
                    state,
                    attempts,
                    latency_ms,
                    detail: result.error.map(|k| k.to_string()),
                };
                (record, Some(result))
            }
            Err(retry_error) => {
                warn!(
                    agent = %kind,
                    attempts = retry_error.attempts,
                    error = %retry_error.last_error,
                    "agent invocation failed"
                );
                let failure = FailureKind::from_error(&retry_error.last_error);
                let (state, detail) = if matches!(retry_error.last_error, Error::CircuitOpen(_)) {
                    (StepState::Skipped, retry_error.last_error.to_string())
                } else {
                    let exhausted = Error::AgentExhausted {
                        agent: kind,
                        attempts,
                        message: retry_error.last_error.to_string(),
                    };
                    (StepState::Failed, exhausted.to_string())
                };
                let record = StepRecord {
                    agent: kind,
                    state,
                    attempts,
                    latency_ms,
                    detail: Some(detail),
                };
                (record, Some(AgentResult::failure(kind, latency_ms, failure)))
            }
        }
    }

    /// Record invocation outcomes without blocking the response path. Storage
    /// failures are logged inside the store and never surface here.
    fn record_outcomes(&self, request_id: Uuid, results: &[AgentResult]) {
        for result in results {
            let record = if result.success {
                FeedbackRecord::success(
                    request_id,
                    result.agent,
                    result.latency_ms,
                    result.confidence_raw,
                    result.fields.keys().cloned().collect(),
                )
            } else {
                FeedbackRecord::failure(
                    request_id,
                    result.agent,
                    result.latency_ms,
                    result.error.unwrap_or(FailureKind::Upstream),
                )
            };
            let store = Arc::clone(&self.feedback);
            tokio::spawn(async move {
                store.record(record).await;
            });
        }
    }
}

/// Output fields the declared capabilities demand
pub(crate) fn required_fields(capabilities: &HashSet<Capability>) -> Vec<&'static str> {
    let mut required = Vec::with_capacity(capabilities.len());
    if capabilities.contains(&Capability::Sql) {
        required.push(fields::SQL_QUERY);
    }
    if capabilities.contains(&Capability::Chart) {
        required.push(fields::CHART_CONFIG);
    }
    if capabilities.contains(&Capability::Insights) {
        required.push(fields::INSIGHTS);
    }
    required
}

fn absorb_context(base: &mut AgentRequest, result: Option<&AgentResult>) {
    if let Some(result) = result {
        if result.success {
            for (key, value) in &result.fields {
                base.context.insert(key.clone(), value.clone());
            }
        }
    }
}
