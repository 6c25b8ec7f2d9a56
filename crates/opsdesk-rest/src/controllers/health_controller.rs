//! Health check controller.

use crate::responses::{ok, ApiResult, AppError};
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use opsdesk_core::OpsError;
use opsdesk_jobs::HealthRecord;
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Health status.
    pub status: String,
    /// Application version.
    pub version: String,
}

/// Creates the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/queue", get(queue_health))
}

/// Liveness of the HTTP process itself.
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Latest queue health record written by the processor.
pub async fn queue_health(State(state): State<AppState>) -> ApiResult<HealthRecord> {
    let settings = state.queue.settings();
    match state.queue.queue_health().await? {
        Some(record) => ok(record),
        None => Err(AppError(OpsError::not_found(
            "health_check",
            format!("{}/{}", settings.health_check_type, settings.health_check_name),
        ))),
    }
}
