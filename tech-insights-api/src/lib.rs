//! Tech Insights API Server
//!
//! REST API for running scorecard checks against entity facts, validating
//! check definitions and reading or writing facts and fact schemas.

pub mod config;
pub mod error;
pub mod handlers;
pub mod state;

pub use config::TechInsightsConfig;
pub use error::{ApiError, ConfigError};
pub use state::AppState;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Checks
        .route("/checks", get(handlers::list_checks))
        .route("/checks/run", post(handlers::run_checks_bulk))
        .route("/checks/run/:namespace/:kind/:name", post(handlers::run_checks))
        .route("/checks/validate", post(handlers::validate_check))
        // Facts
        .route("/fact-schemas", get(handlers::get_fact_schemas).post(handlers::insert_fact_schema))
        .route("/facts", post(handlers::insert_facts))
        .route("/facts/latest", get(handlers::get_latest_facts))
        .route("/facts/range", get(handlers::get_facts_range))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
