//! Processing trigger.

use crate::responses::{ok, ApiResult, AppError};
use crate::state::AppState;
use axum::{body::Bytes, extract::State, routing::post, Router};
use opsdesk_core::OpsError;
use opsdesk_jobs::{BatchReport, RunOverrides};
use tracing::info;

/// Creates the actions router. Authentication is layered on by the caller.
pub fn router() -> Router<AppState> {
    Router::new().route("/internal/actions/process", post(process_actions))
}

/// Runs one processor invocation.
///
/// The body is an optional JSON object of [`RunOverrides`]; an empty body
/// runs with the configured settings.
pub async fn process_actions(State(state): State<AppState>, body: Bytes) -> ApiResult<BatchReport> {
    let overrides = parse_overrides(&body)?;
    info!(?overrides, "Processing triggered over HTTP");

    let report = state.queue.process(&overrides).await?;
    ok(report)
}

fn parse_overrides(body: &[u8]) -> Result<RunOverrides, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunOverrides::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError(OpsError::validation(format!("invalid processing parameters: {}", e))))
}
