//! Circuit breaker, one per agent
//!
//! Protects the orchestrator from hammering a failing agent:
//! - Closed: calls pass through; consecutive failures are counted
//! - Open: calls are rejected without reaching the agent
//! - HalfOpen: after the cooldown, probe calls test recovery
//!
//! The Open to HalfOpen transition is evaluated lazily on `can_execute`, so
//! no background timer is needed.

use crate::agents::AgentKind;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls pass through
    Closed,
    /// Too many consecutive failures, calls are rejected
    Open,
    /// Cooldown elapsed, probing for recovery
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Circuit breaker configuration
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,
    /// How long the circuit stays open before probing
    pub open_duration: Duration,
    /// Probe successes required in half-open state to close the circuit
    pub half_open_probe_count: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_duration: Duration::from_secs(30),
            half_open_probe_count: 2,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the consecutive failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Set the open-state cooldown
    #[must_use]
    pub fn with_open_duration(mut self, duration: Duration) -> Self {
        self.open_duration = duration;
        self
    }

    /// Set the number of probe successes needed to close
    #[must_use]
    pub fn with_half_open_probe_count(mut self, count: u32) -> Self {
        self.half_open_probe_count = count;
        self
    }
}

/// Per-agent circuit breaker
pub struct CircuitBreaker {
    agent: AgentKind,
    config: CircuitBreakerConfig,
    state: RwLock<CircuitState>,
    consecutive_failures: AtomicU32,
    probe_successes: AtomicU32,
    opened_at: AtomicU64,
}

impl CircuitBreaker {
    /// Create a breaker for an agent
    #[must_use]
    pub fn new(agent: AgentKind, config: CircuitBreakerConfig) -> Self {
        Self {
            agent,
            config,
            state: RwLock::new(CircuitState::Closed),
            consecutive_failures: AtomicU32::new(0),
            probe_successes: AtomicU32::new(0),
            opened_at: AtomicU64::new(0),
        }
    }

    /// The agent this breaker protects
    #[must_use]
    pub fn agent(&self) -> AgentKind {
        self.agent
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.state.read().map(|s| *s).unwrap_or(CircuitState::Closed)
    }

    /// Current consecutive failure count
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::SeqCst)
    }

    /// Whether a call may proceed. Transitions Open to HalfOpen when the
    /// cooldown has elapsed.
    #[must_use]
    pub fn can_execute(&self) -> bool {
        if self.state() == CircuitState::Open {
            let opened_at = self.opened_at.load(Ordering::SeqCst);
            let elapsed = Duration::from_millis(current_timestamp().saturating_sub(opened_at));
            if elapsed >= self.config.open_duration {
                self.half_open();
            }
        }

        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        }
    }

    /// Record a successful call
    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
            }
            CircuitState::HalfOpen => {
                let probes = self.probe_successes.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(
                    agent = %self.agent,
                    probes,
                    needed = self.config.half_open_probe_count,
                    "probe succeeded in half-open state"
                );
                if probes >= self.config.half_open_probe_count {
                    self.close();
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed call
    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(
                    agent = %self.agent,
                    failures,
                    threshold = self.config.failure_threshold,
                    "consecutive failure recorded"
                );
                if failures >= self.config.failure_threshold {
                    self.open();
                }
            }
            CircuitState::HalfOpen => {
                // A failed probe reopens with a fresh cooldown.
                warn!(agent = %self.agent, "probe failed, circuit reopening");
                self.open();
            }
            CircuitState::Open => {}
        }
    }

    /// Force the breaker back to closed, used by the admin surface
    pub fn reset(&self) {
        self.close();
    }

    fn open(&self) {
        if let Ok(mut state) = self.state.write() {
            if *state != CircuitState::Open {
                info!(
                    agent = %self.agent,
                    failures = self.consecutive_failures.load(Ordering::SeqCst),
                    "circuit opened"
                );
                *state = CircuitState::Open;
            }
            // Reopening from half-open restarts the cooldown.
            self.opened_at.store(current_timestamp(), Ordering::SeqCst);
        }
    }

    fn half_open(&self) {
        if let Ok(mut state) = self.state.write() {
            if *state == CircuitState::Open {
                info!(agent = %self.agent, "circuit entering half-open state");
                *state = CircuitState::HalfOpen;
                self.probe_successes.store(0, Ordering::SeqCst);
                self.consecutive_failures.store(0, Ordering::SeqCst);
            }
        }
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.write() {
            if *state != CircuitState::Closed {
                info!(agent = %self.agent, "circuit closed");
                *state = CircuitState::Closed;
            }
            self.consecutive_failures.store(0, Ordering::SeqCst);
            self.probe_successes.store(0, Ordering::SeqCst);
        }
    }
}

/// Point-in-time view of one breaker, exposed via the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    /// Agent the breaker protects
    pub agent: AgentKind,
    /// Current state
    pub state: CircuitState,
    /// Current consecutive failure count
    pub consecutive_failures: u32,
}

/// Lazily-populated set of breakers, one per agent kind
pub struct CircuitBreakerRegistry {
    breakers: DashMap<AgentKind, Arc<CircuitBreaker>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    /// Create a registry that builds breakers with the given configuration
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: DashMap::new(),
            config,
        }
    }

    /// Breaker for an agent, created on first use
    #[must_use]
    pub fn breaker(&self, agent: AgentKind) -> Arc<CircuitBreaker> {
        self.breakers
            .entry(agent)
            .or_insert_with(|| Arc::new(CircuitBreaker::new(agent, self.config.clone())))
            .clone()
    }

    /// Snapshot every instantiated breaker
    #[must_use]
    pub fn snapshot(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<BreakerSnapshot> = self
            .breakers
            .iter()
            .map(|entry| BreakerSnapshot {
                agent: *entry.key(),
                state: entry.value().state(),
                consecutive_failures: entry.value().consecutive_failures(),
            })
            .collect();
        snapshots.sort_by_key(|s| s.agent.as_str());
        snapshots
    }

    /// Reset every breaker to closed
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}

fn current_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
