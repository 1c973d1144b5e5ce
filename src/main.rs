//! Sibyl - AI Analytics Orchestration Service
//!
//! Binary entry point: loads configuration, initializes logging, and runs
//! the HTTP server.

#![forbid(unsafe_code)]

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod server;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sibyl=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("starting sibyl v{}", env!("CARGO_PKG_VERSION"));

    let config = server::AppConfig::load()?;
    server::run(config).await
}
