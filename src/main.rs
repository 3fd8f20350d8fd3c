use anyhow::Result;
use std::sync::Arc;
use tracing::info;

mod api;
mod calendar;
mod config;
mod dashboard;
mod directory;
mod error;
mod format;
mod metrics;
mod models;
mod page;
mod profile;
mod server;
mod throttle;

#[cfg(test)]
mod testing;

use metrics::Metrics;
use server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("divscout_dashboard=info".parse()?),
        )
        .init();

    info!("Starting DivScout dashboard");

    let config = config::load_config()?;
    info!("Configuration loaded");
    info!("Upstream API: {}", config.api.base_url);

    let metrics = Arc::new(Metrics::new());
    let state = AppState::new(&config, metrics.clone())?;

    tokio::spawn(state.directory.clone().run());

    // Periodic profile cache sweep
    let profiles = state.profiles.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            profiles.cleanup_expired();
        }
    });

    tokio::spawn(metrics::run_metrics_server(config.metrics.clone(), metrics));

    server::run(config, state).await?;

    Ok(())
}
