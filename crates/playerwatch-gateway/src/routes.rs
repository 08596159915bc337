//! API route handlers for the gateway.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use playerwatch_core::Trigger;
use playerwatch_pipeline::RunResponse;

use super::server::AppState;

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "playerwatch-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

/// Run the pipeline once and answer with the run response.
pub async fn trigger_run(State(state): State<Arc<AppState>>) -> (StatusCode, Json<RunResponse>) {
    tracing::info!("📥 Run requested over HTTP");
    let response = RunResponse::from_result(state.pipeline.run(Trigger::Http).await);
    if response.status_code != 200 {
        tracing::error!("❌ HTTP run failed: {}", response.body);
    }
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response))
}
