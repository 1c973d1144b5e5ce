//! Server configuration
//!
//! Loaded from `config/default.toml` (optional) with `SIBYL__` environment
//! overrides, e.g. `SIBYL__SERVER__PORT=9090`.

use anyhow::{Context, Result};
use serde::Deserialize;
use sibyl_core::{
    CircuitBreakerConfig, ConfidenceWeights, FeedbackWindow, OrchestratorConfig, RetryConfig,
};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
    #[serde(default)]
    pub feedback: FeedbackSettings,
    #[serde(default)]
    pub tuning: TuningSettings,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::Environment::with_prefix("SIBYL").separator("__"))
            .build()
            .context("failed to build configuration")?;

        settings
            .try_deserialize()
            .context("failed to deserialize configuration")
    }

    /// Core orchestrator configuration derived from the TOML view
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let o = &self.orchestrator;
        OrchestratorConfig::new()
            .with_retry(
                RetryConfig::new()
                    .with_max_attempts(o.retry.max_attempts)
                    .with_base_backoff(Duration::from_millis(o.retry.base_backoff_ms))
                    .with_max_backoff(Duration::from_millis(o.retry.max_backoff_ms)),
            )
            .with_breaker(
                CircuitBreakerConfig::new()
                    .with_failure_threshold(o.circuit_breaker.failure_threshold)
                    .with_open_duration(Duration::from_secs(o.circuit_breaker.open_duration_secs))
                    .with_half_open_probe_count(o.circuit_breaker.half_open_probe_count),
            )
            .with_weights(o.confidence.clone())
            .with_feedback_window(self.feedback.window())
            .with_agent_deadline(Duration::from_secs(o.agent_deadline_secs))
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            llm: LlmSettings::default(),
            orchestrator: OrchestratorSettings::default(),
            feedback: FeedbackSettings::default(),
            tuning: TuningSettings::default(),
        }
    }
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

/// Upstream LLM endpoint settings
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            model: default_model(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:11434/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_llm_timeout_secs() -> u64 {
    60
}

/// Orchestrator reliability settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrchestratorSettings {
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub circuit_breaker: BreakerSettings,
    #[serde(default)]
    pub confidence: ConfidenceWeights,
    #[serde(default = "default_agent_deadline_secs")]
    pub agent_deadline_secs: u64,
}

fn default_agent_deadline_secs() -> u64 {
    30
}

/// Retry policy settings
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_backoff_ms() -> u64 {
    200
}
fn default_max_backoff_ms() -> u64 {
    5000
}

/// Circuit breaker settings
#[derive(Debug, Clone, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_open_duration_secs")]
    pub open_duration_secs: u64,
    #[serde(default = "default_half_open_probe_count")]
    pub half_open_probe_count: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            open_duration_secs: default_open_duration_secs(),
            half_open_probe_count: default_half_open_probe_count(),
        }
    }
}

fn default_failure_threshold() -> u32 {
    5
}
fn default_open_duration_secs() -> u64 {
    30
}
fn default_half_open_probe_count() -> u32 {
    2
}

/// Feedback store settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedbackSettings {
    /// SQLite path. In-memory store when unset.
    #[serde(default)]
    pub db_path: Option<String>,
    #[serde(default = "default_window_max_records")]
    pub window_max_records: usize,
    #[serde(default = "default_window_max_age_days")]
    pub window_max_age_days: i64,
}

impl FeedbackSettings {
    /// Sliding window derived from these settings
    pub fn window(&self) -> FeedbackWindow {
        FeedbackWindow {
            max_records: self.window_max_records.max(1),
            max_age: chrono::Duration::days(self.window_max_age_days.max(1)),
        }
    }
}

fn default_window_max_records() -> usize {
    100
}
fn default_window_max_age_days() -> i64 {
    7
}

/// Prompt tuning settings
#[derive(Debug, Clone, Deserialize)]
pub struct TuningSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_tuning_interval_secs")]
    pub interval_secs: u64,
}

impl Default for TuningSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: default_tuning_interval_secs(),
        }
    }
}

fn default_tuning_interval_secs() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.orchestrator.retry.max_attempts, 3);
        assert_eq!(config.orchestrator.circuit_breaker.failure_threshold, 5);
        assert!(!config.tuning.enabled);
        assert!(config.feedback.db_path.is_none());
        assert!(config.orchestrator.confidence.validate().is_ok());
    }

    #[test]
    fn test_orchestrator_config_conversion() {
        let mut config = AppConfig::default();
        config.orchestrator.retry.max_attempts = 5;
        config.orchestrator.circuit_breaker.open_duration_secs = 10;

        let core = config.orchestrator_config();
        assert_eq!(core.retry.max_attempts, 5);
        assert_eq!(core.breaker.open_duration, Duration::from_secs(10));
    }

    #[test]
    fn test_feedback_window_bounds() {
        let settings = FeedbackSettings {
            db_path: None,
            window_max_records: 0,
            window_max_age_days: 0,
        };
        let window = settings.window();
        assert_eq!(window.max_records, 1);
        assert_eq!(window.max_age, chrono::Duration::days(1));
    }
}
