//! Processor entry point shared by the CLI and the HTTP trigger.
//!
//! Each call builds a fresh [`ActionProcessor`] from the configured settings
//! plus the caller's overrides, so one invocation never leaks state into the
//! next.

use crate::alert::AlertSink;
use crate::audit::AuditSink;
use crate::config::{ProcessorSettings, RunOverrides};
use crate::error::JobResult;
use crate::handler::HandlerRegistry;
use crate::health::HealthRecord;
use crate::processor::ActionProcessor;
use crate::report::BatchReport;
use crate::store::JobStore;
use async_trait::async_trait;
use opsdesk_core::Interface;
use std::sync::Arc;

/// High-level operations on the action queue.
#[async_trait]
pub trait ActionQueueInterface: Interface {
    /// Runs one invocation with `overrides` applied on top of the configured settings.
    async fn process(&self, overrides: &RunOverrides) -> JobResult<BatchReport>;

    /// Latest health record written by this processor, if any.
    async fn queue_health(&self) -> JobResult<Option<HealthRecord>>;

    /// Settings used when no overrides are given.
    fn settings(&self) -> &ProcessorSettings;
}

#[derive(Clone)]
struct AlertRoute {
    sink: Arc<dyn AlertSink>,
    recipient: String,
    enabled: bool,
}

/// [`ActionQueueInterface`] over any [`JobStore`].
pub struct ActionQueueService<S: JobStore> {
    store: Arc<S>,
    registry: HandlerRegistry<S::Unit>,
    settings: ProcessorSettings,
    audit: Option<Arc<dyn AuditSink>>,
    alert: Option<AlertRoute>,
}

impl<S: JobStore> ActionQueueService<S> {
    /// Creates a service with log-only alerts and no audit trail.
    pub fn new(store: Arc<S>, registry: HandlerRegistry<S::Unit>, settings: ProcessorSettings) -> Self {
        Self {
            store,
            registry,
            settings,
            audit: None,
            alert: None,
        }
    }

    /// Audits every completed or failed job to `sink`.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Routes critical-rate alerts to `sink`.
    pub fn with_alert_sink(mut self, sink: Arc<dyn AlertSink>, recipient: impl Into<String>, enabled: bool) -> Self {
        self.alert = Some(AlertRoute {
            sink,
            recipient: recipient.into(),
            enabled,
        });
        self
    }

    /// Builds the processor for one invocation.
    pub fn processor(&self, overrides: &RunOverrides) -> JobResult<ActionProcessor<S>> {
        let settings = self.settings.clone().with_overrides(overrides)?;
        let mut processor = ActionProcessor::new(Arc::clone(&self.store), self.registry.clone(), settings);

        if let Some(sink) = &self.audit {
            processor = processor.with_audit_sink(Arc::clone(sink));
        }
        if let Some(route) = &self.alert {
            processor = processor.with_alert_sink(Arc::clone(&route.sink), route.recipient.clone(), route.enabled);
        }
        Ok(processor)
    }
}

#[async_trait]
impl<S: JobStore> ActionQueueInterface for ActionQueueService<S> {
    async fn process(&self, overrides: &RunOverrides) -> JobResult<BatchReport> {
        self.processor(overrides)?.run().await
    }

    async fn queue_health(&self) -> JobResult<Option<HealthRecord>> {
        self.store
            .latest_health(&self.settings.health_check_type, &self.settings.health_check_name)
            .await
    }

    fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }
}
