//! HTTP server assembly and lifecycle

mod config;

pub use config::AppConfig;

use crate::api;
use anyhow::{Context, Result};
use axum::Extension;
use sibyl_core::{
    AgentKind, FeedbackStore, HeuristicTuning, LlmAgent, MemoryFeedbackStore, NoopTuning,
    Orchestrator, PromptTuning, SqliteFeedbackStore,
};
use sibyl_llm::{HttpLlmClient, HttpLlmConfig, LlmClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared handles the API layer works against
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub feedback: Arc<dyn FeedbackStore>,
    pub tuning: Arc<dyn PromptTuning>,
}

/// Wire the LLM client, stores, agents, and orchestrator together
pub async fn build_state(config: &AppConfig) -> Result<AppState> {
    let mut llm_config = HttpLlmConfig::new(config.llm.base_url.clone())
        .with_timeout(Duration::from_secs(config.llm.timeout_secs));
    if let Some(key) = &config.llm.api_key {
        llm_config = llm_config.with_api_key(key.clone());
    }
    let client: Arc<dyn LlmClient> =
        Arc::new(HttpLlmClient::new(llm_config).context("failed to build LLM client")?);

    let feedback: Arc<dyn FeedbackStore> = match &config.feedback.db_path {
        Some(path) => {
            info!(path = %path, "using sqlite feedback store");
            Arc::new(
                SqliteFeedbackStore::new(path)
                    .await
                    .context("failed to open feedback store")?,
            )
        }
        None => {
            info!("no feedback db_path configured, using in-memory store");
            Arc::new(MemoryFeedbackStore::new())
        }
    };

    let tuning: Arc<dyn PromptTuning> = if config.tuning.enabled {
        let tuning = HeuristicTuning::new(feedback.clone(), config.feedback.window());
        tuning.enable();
        Arc::new(tuning)
    } else {
        Arc::new(NoopTuning)
    };

    let mut orchestrator = Orchestrator::new(feedback.clone(), config.orchestrator_config())
        .context("invalid orchestrator configuration")?;
    for kind in AgentKind::all() {
        orchestrator = orchestrator.with_agent(Arc::new(LlmAgent::new(
            kind,
            client.clone(),
            config.llm.model.clone(),
            tuning.clone(),
        )));
    }

    Ok(AppState {
        orchestrator: Arc::new(orchestrator),
        feedback,
        tuning,
    })
}

/// Run the server until shutdown
pub async fn run(config: AppConfig) -> Result<()> {
    let state = build_state(&config).await?;

    if config.tuning.enabled {
        spawn_tuning_loop(state.clone(), config.tuning.interval_secs);
    }

    let app = api::api_router()
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "sibyl listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shutdown complete");
    Ok(())
}

/// Periodically analyze feedback and apply prompt adjustments
fn spawn_tuning_loop(state: AppState, interval_secs: u64) {
    let period = Duration::from_secs(interval_secs.max(10));
    info!(period_secs = period.as_secs(), "prompt tuning loop enabled");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        // The first tick fires immediately; skip it so the service warms up
        // with some feedback before the first analysis.
        interval.tick().await;
        loop {
            interval.tick().await;
            for adjustment in state.tuning.analyze().await {
                state.tuning.apply(adjustment).await;
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
