//! System/health API handlers.
//!
//! # Purpose and responsibility
//! Lightweight endpoints for probes and operators: store health and service
//! metadata. Neither requires a bearer token.
use crate::api::error::{ApiError, api_unavailable};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub api_version: String,
    pub storage_backend: String,
    pub durable_storage: bool,
    pub resources: Vec<String>,
}

/// Probe the backing store; 503 when it is unreachable.
pub(crate) async fn system_health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, ApiError> {
    if let Err(err) = state.backend.health_check().await {
        return Err(api_unavailable(&err));
    }
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
    }))
}

pub(crate) async fn system_info(State(state): State<AppState>) -> Json<SystemInfo> {
    Json(SystemInfo {
        api_version: state.api_version.clone(),
        storage_backend: state.backend.backend_name().to_string(),
        durable_storage: state.backend.is_durable(),
        resources: state.resource_kinds(),
    })
}
