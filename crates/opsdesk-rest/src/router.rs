//! Main application router.

use crate::{
    controllers::{actions_controller, health_controller, metrics_controller},
    middleware::{logging_middleware, require_trigger_token, TriggerAuthState},
    state::AppState,
};
use axum::{middleware, routing::get, Router};
use opsdesk_config::ServerConfig;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

/// Creates the application router.
///
/// The processing trigger requires `server.trigger_token`; health and
/// metrics endpoints are open.
pub fn create_router(state: AppState, server_config: &ServerConfig, metrics_path: &str) -> Router {
    let auth_state = TriggerAuthState::new(server_config.trigger_token.clone());

    let actions = actions_controller::router()
        .route_layer(middleware::from_fn_with_state(auth_state, require_trigger_token));

    let router = Router::new()
        .merge(health_controller::router())
        .merge(actions)
        .route(metrics_path, get(metrics_controller::render_metrics))
        .route("/", get(root))
        .with_state(state)
        .layer(TimeoutLayer::new(server_config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(logging_middleware));

    info!(metrics_path, "Router created with trigger, health and metrics endpoints");
    router
}

/// Root endpoint handler.
async fn root() -> &'static str {
    "opsdesk action processor"
}
