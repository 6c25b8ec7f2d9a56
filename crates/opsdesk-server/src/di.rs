//! Dependency injection module using Shaku.
//!
//! `ProcessorModule` holds the components that need the MySQL pool: the pool
//! itself and the audit sink. The job store is built on the resolved pool.

use opsdesk_config::DatabaseConfig;
use opsdesk_core::{module, HasComponent, OpsResult};
use opsdesk_jobs::{AuditSink, MySqlAuditSink};
use opsdesk_repository::{DatabasePool, DatabasePoolInterface, DatabasePoolParameters};
use std::sync::Arc;

module! {
    pub ProcessorModule {
        components = [
            DatabasePool,
            MySqlAuditSink,
        ],
        providers = [],
    }
}

impl ProcessorModule {
    /// Resolves the database pool.
    pub fn database_pool(&self) -> Arc<dyn DatabasePoolInterface> {
        self.resolve()
    }

    /// Resolves the audit sink.
    pub fn audit_sink(&self) -> Arc<dyn AuditSink> {
        self.resolve()
    }
}

/// Connects to MySQL and builds the module around the pool.
pub async fn build_processor_module(db_config: &DatabaseConfig) -> OpsResult<Arc<ProcessorModule>> {
    let db_pool = DatabasePool::new(db_config).await?;
    Ok(Arc::new(processor_module_from_pool(&db_pool)))
}

/// Builds the module over an existing pool.
pub fn processor_module_from_pool(db_pool: &DatabasePool) -> ProcessorModule {
    ProcessorModule::builder()
        .with_component_parameters::<DatabasePool>(DatabasePoolParameters {
            pool: db_pool.inner().clone(),
        })
        .build()
}
