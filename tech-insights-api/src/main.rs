//! Tech Insights - Main Application Entry Point
//!
//! Serves scorecard checks evaluated against entity facts.

use std::sync::Arc;
use tech_insights_api::{AppState, TechInsightsConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tech_insights=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = TechInsightsConfig::load()?;
    let (host, port) = (config.server.host.clone(), config.server.port);

    tracing::info!("Starting Tech Insights server on {}:{}", host, port);

    let app_state = Arc::new(AppState::from_config(&config).await?);
    let app = tech_insights_api::create_router(app_state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", host, port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
