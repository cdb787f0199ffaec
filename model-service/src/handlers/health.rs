//! Health check handler

use axum::{extract::State, Json};
use serde::Serialize;

use flood_risk_core::logic::model::EngineStatus;

use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: String,
    model_loaded: bool,
    timestamp: i64,
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.clone(),
        model_loaded: state.pipeline.is_ready(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

/// Pipeline status: load state, run id and latency counters
pub async fn engine_status(State(state): State<AppState>) -> Json<EngineStatus> {
    Json(state.pipeline.status())
}
