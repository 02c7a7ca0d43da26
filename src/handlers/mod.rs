mod health;
mod metrics;
mod vitals;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::state::AppState;

pub use health::health_handler;
pub use metrics::metrics_handler;
pub use vitals::{ingest_handler, preflight_handler};

pub const VITALS_PATH: &str = "/api/vitals";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(VITALS_PATH, post(ingest_handler).options(preflight_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}
