//! Per-invocation processor settings.

use crate::error::{JobError, JobResult};
use crate::health::HealthThresholds;
use opsdesk_config::{ConfigValidator, ProcessorConfig};
use serde::{Deserialize, Serialize};

/// Longest accepted lock timeout (30 days).
pub const MAX_LOCK_TIMEOUT_SECS: u64 = 30 * 24 * 3600;
/// Longest accepted expiry window (10 years).
pub const MAX_EXPIRE_AFTER_HOURS: u64 = 10 * 365 * 24;

/// Parameters a caller may override for one invocation.
///
/// Absent fields fall back to the configured [`ProcessorConfig`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunOverrides {
    pub batch_size: Option<u32>,
    pub max_retries: Option<u32>,
    pub lock_timeout_secs: Option<u64>,
    pub expire_after_hours: Option<u64>,
}

/// Resolved settings for one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessorSettings {
    pub batch_size: u32,
    /// Cap applied on top of each job's own `max_retries`.
    pub max_retries: u32,
    pub lock_timeout_secs: u64,
    pub expire_after_hours: u64,
    pub thresholds: HealthThresholds,
    pub health_check_type: String,
    pub health_check_name: String,
    pub audit_enabled: bool,
}

impl ProcessorSettings {
    /// Settings straight from configuration.
    pub fn from_config(config: &ProcessorConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            max_retries: config.max_retries,
            lock_timeout_secs: config.lock_timeout_secs,
            expire_after_hours: config.expire_after_hours,
            thresholds: HealthThresholds {
                warning: config.warning_threshold,
                critical: config.critical_threshold,
            },
            health_check_type: config.health_check_type.clone(),
            health_check_name: config.health_check_name.clone(),
            audit_enabled: config.audit_enabled,
        }
    }

    /// Applies caller overrides and validates the result.
    pub fn with_overrides(mut self, overrides: &RunOverrides) -> JobResult<Self> {
        if let Some(v) = overrides.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = overrides.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = overrides.lock_timeout_secs {
            self.lock_timeout_secs = v;
        }
        if let Some(v) = overrides.expire_after_hours {
            self.expire_after_hours = v;
        }
        self.validate()?;
        Ok(self)
    }

    /// Rejects settings the processor cannot run with.
    pub fn validate(&self) -> JobResult<()> {
        if self.batch_size == 0 || self.batch_size > ConfigValidator::MAX_BATCH_SIZE {
            return Err(JobError::Configuration(format!(
                "batch_size must be between 1 and {}, got {}",
                ConfigValidator::MAX_BATCH_SIZE,
                self.batch_size
            )));
        }
        if self.max_retries == 0 {
            return Err(JobError::Configuration("max_retries must be at least 1".to_string()));
        }
        if self.lock_timeout_secs == 0 || self.lock_timeout_secs > MAX_LOCK_TIMEOUT_SECS {
            return Err(JobError::Configuration(format!(
                "lock_timeout_secs must be between 1 and {}, got {}",
                MAX_LOCK_TIMEOUT_SECS, self.lock_timeout_secs
            )));
        }
        if self.expire_after_hours == 0 || self.expire_after_hours > MAX_EXPIRE_AFTER_HOURS {
            return Err(JobError::Configuration(format!(
                "expire_after_hours must be between 1 and {}, got {}",
                MAX_EXPIRE_AFTER_HOURS, self.expire_after_hours
            )));
        }
        Ok(())
    }

    /// Lock timeout as a chrono duration.
    pub fn lock_timeout(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.lock_timeout_secs.min(MAX_LOCK_TIMEOUT_SECS) as i64)
    }

    /// Expiry window as a chrono duration.
    pub fn expire_after(&self) -> chrono::Duration {
        chrono::Duration::hours(self.expire_after_hours.min(MAX_EXPIRE_AFTER_HOURS) as i64)
    }
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self::from_config(&ProcessorConfig::default())
    }
}
