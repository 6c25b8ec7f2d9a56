//! Application state for Axum handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use opsdesk_jobs::ActionQueueInterface;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<dyn ActionQueueInterface>,
    /// Present when the Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Creates a new application state.
    pub fn new(queue: Arc<dyn ActionQueueInterface>) -> Self {
        Self { queue, metrics: None }
    }

    /// Serves `handle` on the metrics endpoint.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
