use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::health::HealthState;
use crate::api::latency::{LatencySnapshot, LatencyStats};
use crate::error::AppError;
use crate::scanner::{ConcurrencyGate, ScanService};
use crate::types::ScanResult;

#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<ScanService>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
    pub gate: Arc<ConcurrencyGate>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .route("/scans/:category", get(list_scans))
        .route("/scans/:category/latest", get(latest_scan))
        .route("/scans/:category/trigger", post(trigger_scan))
        .route("/scans/:category/:id", get(get_scan))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TriggerQuery {
    pub expiry: Option<String>,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub categories: Vec<String>,
    pub scheduler_running: bool,
    pub scans_in_flight: u64,
    pub scans_completed: u64,
    pub scans_failed: u64,
    pub last_scan_at_ms: Option<u64>,
    pub gate_capacity: usize,
    pub gate_in_use: usize,
    pub gate_queued: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    let last = state.health.last_scan_at_ms();
    Json(HealthResponse {
        status: "ok",
        categories: state.service.category_names(),
        scheduler_running: state.health.scheduler_running(),
        scans_in_flight: state.health.scans_in_flight(),
        scans_completed: state.health.scans_completed(),
        scans_failed: state.health.scans_failed(),
        last_scan_at_ms: (last > 0).then_some(last),
        gate_capacity: state.gate.capacity(),
        gate_in_use: state.gate.in_use(),
        gate_queued: state.gate.queued(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}

async fn list_scans(
    State(state): State<ApiState>,
    Path(category): Path<String>,
) -> Result<Json<Vec<ScanResult>>, AppError> {
    Ok(Json(state.service.list(&category).await?))
}

async fn latest_scan(
    State(state): State<ApiState>,
    Path(category): Path<String>,
) -> Result<(StatusCode, Json<Option<ScanResult>>), AppError> {
    let latest = state.service.latest(&category).await?;
    let status = if latest.is_some() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    Ok((status, Json(latest)))
}

async fn get_scan(
    State(state): State<ApiState>,
    Path((category, id)): Path<(String, String)>,
) -> Result<(StatusCode, Json<Option<ScanResult>>), AppError> {
    let found = state.service.get(&category, &id).await?;
    let status = if found.is_some() { StatusCode::OK } else { StatusCode::NOT_FOUND };
    Ok((status, Json(found)))
}

async fn trigger_scan(
    State(state): State<ApiState>,
    Path(category): Path<String>,
    Query(params): Query<TriggerQuery>,
) -> Result<Json<ScanResult>, AppError> {
    let result = state.service.trigger(&category, params.expiry.as_deref()).await?;
    Ok(Json(result))
}
