//! Trigger token middleware.

use crate::responses::AppError;
use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};
use opsdesk_core::OpsError;
use std::sync::Arc;
use tracing::debug;

/// State for [`require_trigger_token`].
#[derive(Clone)]
pub struct TriggerAuthState {
    token: Option<Arc<str>>,
}

impl TriggerAuthState {
    /// Accepts `Bearer <token>`. With no token configured every request is rejected.
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()).map(Arc::from),
        }
    }

    fn accepts(&self, presented: &str) -> bool {
        match &self.token {
            Some(expected) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
            None => false,
        }
    }
}

/// Rejects requests without the configured bearer token with 401.
pub async fn require_trigger_token(
    State(state): State<TriggerAuthState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|token| state.accepts(token));

    match presented {
        Some(true) => Ok(next.run(request).await),
        Some(false) => {
            debug!("Trigger token mismatch");
            Err(OpsError::unauthorized("invalid trigger token").into())
        }
        None => Err(OpsError::unauthorized("missing bearer token").into()),
    }
}

/// Compares without early exit, so response timing does not reveal how many
/// leading bytes of a guessed token were right.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
