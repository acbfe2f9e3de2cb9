//! Liveness and sweep counters; no caller identity required

use axum::{extract::State, routing::get, Json, Router};
use lifecycle::SweepMetricsSnapshot;
use serde::Serialize;

use super::AppStateArc;

pub fn routes() -> Router<AppStateArc> {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

async fn health(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn metrics(State(state): State<AppStateArc>) -> Json<SweepMetricsSnapshot> {
    Json(state.service.sweep_metrics().snapshot())
}
