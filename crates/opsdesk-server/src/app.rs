//! Application assembly for the `run` and `serve` commands.

use crate::di::{build_processor_module, ProcessorModule};
use crate::startup::{print_banner, print_startup_info};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opsdesk_config::AppConfig;
use opsdesk_core::{OpsError, OpsResult};
use opsdesk_jobs::{
    handlers, register_metrics, sink_from_config, ActionQueueInterface, ActionQueueService, BatchReport, JobError,
    JobResult, MySqlJobStore, ProcessorSettings, RunOverrides,
};
use opsdesk_repository::DatabasePoolInterface;
use opsdesk_rest::{create_router, AppState};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

/// Builds the MySQL-backed queue service from configuration.
pub fn build_queue_service(config: &AppConfig, module: &ProcessorModule) -> OpsResult<ActionQueueService<MySqlJobStore>> {
    let settings = ProcessorSettings::from_config(&config.processor);
    settings
        .validate()
        .map_err(|e| OpsError::configuration(e.to_string()))?;

    let alert_sink = sink_from_config(&config.alerting).map_err(|e| OpsError::configuration(e.to_string()))?;
    let audit_enabled = settings.audit_enabled;

    let store = Arc::new(MySqlJobStore::new(module.database_pool()));
    let mut service = ActionQueueService::new(store, handlers::mysql_registry(), settings).with_alert_sink(
        alert_sink,
        config.alerting.recipient.clone(),
        config.alerting.enabled,
    );
    if audit_enabled {
        service = service.with_audit_sink(module.audit_sink());
    }
    Ok(service)
}

async fn connect(config: &AppConfig) -> OpsResult<Arc<ProcessorModule>> {
    let module = build_processor_module(&config.database).await?;
    if config.database.run_migrations {
        module.database_pool().run_migrations().await?;
    }
    Ok(module)
}

/// Processes one batch.
///
/// Anything that stops the pass before a job is touched (bad parameters,
/// unreachable database, failed migrations) is a [`JobError::Setup`] or
/// [`JobError::Configuration`].
pub async fn run_once(config: &AppConfig, overrides: &RunOverrides) -> JobResult<BatchReport> {
    register_metrics();

    // Validate parameters before touching the database.
    ProcessorSettings::from_config(&config.processor).with_overrides(overrides)?;

    let module = connect(config).await.map_err(JobError::setup)?;
    let service = build_queue_service(config, &module).map_err(JobError::from)?;
    let report = service.process(overrides).await;

    module.database_pool().close().await;
    report
}

/// Installs the Prometheus recorder and describes the processor metrics.
pub fn install_metrics(config: &AppConfig) -> OpsResult<Option<PrometheusHandle>> {
    if !config.observability.metrics_enabled {
        return Ok(None);
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| OpsError::internal(format!("Failed to install metrics recorder: {}", e)))?;
    register_metrics();
    Ok(Some(handle))
}

/// Serves the HTTP trigger until Ctrl+C or SIGTERM.
pub async fn serve(config: &AppConfig) -> OpsResult<()> {
    if config.server.trigger_token.as_deref().map_or(true, str::is_empty) {
        return Err(OpsError::configuration(
            "server.trigger_token is required to serve the processing trigger",
        ));
    }

    print_banner();
    let metrics = install_metrics(config)?;

    let module = connect(config).await?;
    let service: Arc<dyn ActionQueueInterface> = Arc::new(build_queue_service(config, &module)?);

    let mut state = AppState::new(service);
    if let Some(handle) = metrics {
        state = state.with_metrics(handle);
    }
    let router = create_router(state, &config.server, &config.observability.metrics_path);

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| OpsError::internal(format!("Failed to bind {}: {}", addr, e)))?;
    print_startup_info(&addr, &config.observability.metrics_path);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| OpsError::internal(format!("HTTP server error: {}", e)))?;

    module.database_pool().close().await;
    info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown...");
        }
    }
}
