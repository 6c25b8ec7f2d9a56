//! Opsdesk Jobs - Deferred Admin Action Processor
//!
//! Administrators enqueue privileged actions (settings changes, page edits,
//! payroll runs) into a durable MySQL queue. Each processor invocation:
//! - Sweeps stuck claims back to `pending` and expires stale work
//! - Selects a bounded, priority ordered batch of eligible jobs
//! - Claims each job with a single conditional update
//! - Runs the registered handler inside one transaction per job
//! - Retries failed jobs until their retry limit, then marks them failed
//! - Writes one health record per batch and alerts above the critical rate
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Opsdesk Action Processor                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  CLI / HTTP trigger                                              │
//! │     │                                                            │
//! │     ▼                                                            │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                  ActionProcessor::run                    │    │
//! │  │                                                          │    │
//! │  │   Sweeper ──► Claimer ──► Dispatcher ──► HealthReporter  │    │
//! │  │                               │               │          │    │
//! │  │                        HandlerRegistry     Alerter       │    │
//! │  │                               │                          │    │
//! │  │                          RetryPolicy                     │    │
//! │  └───────────────────────────┬─────────────────────────────┘    │
//! │                              │                                   │
//! │                              ▼                                   │
//! │  ┌─────────────────────────────────────────────────────────┐    │
//! │  │                      JobStore                            │    │
//! │  │  ┌────────────────────┐      ┌─────────────────────┐    │    │
//! │  │  │  admin_action_queue│      │ system_health_checks│    │    │
//! │  │  └────────────────────┘      └─────────────────────┘    │    │
//! │  └─────────────────────────────────────────────────────────┘    │
//! │                                                                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use opsdesk_jobs::{handlers, ActionProcessor, MySqlJobStore, ProcessorSettings};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MySqlJobStore::new(pool));
//! let settings = ProcessorSettings::from_config(&config.processor);
//! let processor = ActionProcessor::new(store, handlers::mysql_registry(), settings);
//!
//! let report = processor.run().await?;
//! println!("{}", report.summary);
//! ```

pub mod alert;
pub mod audit;
pub mod claimer;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod handlers;
pub mod health;
pub mod job;
pub mod memory;
pub mod metrics;
pub mod mysql;
pub mod processor;
pub mod report;
pub mod retry;
pub mod service;
pub mod store;
pub mod sweeper;

pub use alert::{sink_from_config, AlertError, AlertOutcome, AlertSink, Alerter, LogAlertSink, WebhookAlertSink};
pub use audit::{AuditEntry, AuditError, AuditOutcome, AuditSink, NoopAuditSink};
pub use claimer::{ClaimOutcome, Claimer};
pub use config::{ProcessorSettings, RunOverrides};
pub use dispatcher::{Dispatched, Dispatcher};
pub use error::{HandlerError, JobError, JobResult};
pub use handler::{parse_payload, ActionHandler, HandlerRegistry};
pub use health::{BatchCounts, HealthRecord, HealthReport, HealthReporter, HealthStatus, HealthThresholds};
pub use job::{ActionJob, ActionOutcome, ActionType, JobId, JobStatus, RequesterContext};
pub use memory::{MemoryJobStore, MemoryUnit};
pub use metrics::{register_metrics, ProcessorMetrics};
pub use mysql::{MySqlAuditSink, MySqlJobStore, MySqlUnit};
pub use processor::ActionProcessor;
pub use report::{BatchReport, BatchSummary, JobLine, JobOutcome};
pub use retry::{FailureDisposition, RetryPolicy};
pub use service::{ActionQueueInterface, ActionQueueService};
pub use store::{JobStore, UnitOfWork};
pub use sweeper::{SweepReport, Sweeper};

/// Re-export commonly used traits
pub mod prelude {
    pub use crate::handler::{parse_payload, ActionHandler};
    pub use crate::job::{ActionOutcome, ActionType, RequesterContext};
    pub use crate::store::{JobStore, UnitOfWork};
    pub use crate::{HandlerError, JobError, JobResult};
}
