//! Device Readings REST API

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use readings_core::{DeviceReadings, ReadinessStatus, ReadingsError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::aggregation::{AggregationService, ServiceStats};
use crate::error::{Error, Result};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<AggregationService>,
}

pub fn create_router(service: Arc<AggregationService>) -> Router {
    let state = AppState { service };

    Router::new()
        // Health
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/stats", get(stats))
        // Readings
        .route("/api/devices/readings", post(update_readings))
        .route(
            "/api/devices/{device_id}/cumulative_count",
            get(get_cumulative_count),
        )
        .route(
            "/api/devices/{device_id}/latest_timestamp",
            get(get_latest_timestamp),
        )
        .with_state(state)
}

async fn health() -> &'static str { "OK" }

/// 503 once the device store can no longer admit new devices
async fn ready(State(state): State<AppState>) -> Result<Json<ReadinessStatus>> {
    let status = state.service.readiness();
    if !status.ready {
        return Err(ReadingsError::Unavailable("device store is at capacity".to_string()).into());
    }
    Ok(Json(status))
}

async fn stats(State(state): State<AppState>) -> Json<ServiceStats> {
    Json(state.service.stats())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CumulativeCountResponse {
    pub cumulative_count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LatestTimestampResponse {
    pub latest_timestamp: Option<DateTime<Utc>>,
}

async fn update_readings(
    State(state): State<AppState>,
    payload: std::result::Result<Json<DeviceReadings>, JsonRejection>,
) -> Result<Json<MessageResponse>> {
    let Json(batch) = payload.map_err(|e| Error::InvalidRequest(e.body_text()))?;

    state.service.ingest(batch.id, &batch.readings)?;

    Ok(Json(MessageResponse {
        message: "Readings updated successfully".to_string(),
    }))
}

async fn get_cumulative_count(
    State(state): State<AppState>,
    device_id: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Json<CumulativeCountResponse>> {
    let device_id = device_id_from(device_id)?;
    let cumulative_count = state.service.cumulative_count(device_id)?;
    Ok(Json(CumulativeCountResponse { cumulative_count }))
}

async fn get_latest_timestamp(
    State(state): State<AppState>,
    device_id: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Json<LatestTimestampResponse>> {
    let device_id = device_id_from(device_id)?;
    let latest_timestamp = state.service.latest_timestamp(device_id)?;
    Ok(Json(LatestTimestampResponse { latest_timestamp }))
}

fn device_id_from(path: std::result::Result<Path<Uuid>, PathRejection>) -> Result<Uuid> {
    path.map(|Path(id)| id)
        .map_err(|e| Error::InvalidRequest(e.body_text()))
}
