//! Configuration validation module.
//!
//! Checks every section up front and reports all problems at once, so a
//! misconfigured processor fails at startup instead of mid-batch.

use crate::{AlertSinkKind, AppConfig};
use std::fmt;
use url::Url;

/// Configuration validation error variants.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// Port number is invalid (must be 1-65535).
    InvalidPort { name: String, value: u16 },
    /// Pool size configuration is invalid (min must be <= max).
    InvalidPoolSize { min: u32, max: u32 },
    /// Pool size exceeds maximum allowed.
    PoolSizeTooLarge { value: u32, maximum: u32 },
    /// URL format is invalid.
    InvalidUrl { url_type: String, message: String },
    /// Timeout value must be positive.
    NonPositiveTimeout { name: String, value: u64 },
    /// Batch size out of range.
    InvalidBatchSize { value: u32, maximum: u32 },
    /// Max retries must allow at least one attempt.
    InvalidMaxRetries { value: u32 },
    /// Thresholds must satisfy `0 < warning <= critical <= 1`.
    InvalidThresholds { warning: f64, critical: f64 },
    /// Health record key parts cannot be empty.
    EmptyHealthKey,
    /// Webhook sink selected without a URL.
    MissingWebhookUrl,
    /// Trigger token too short.
    TriggerTokenTooShort { actual: usize, minimum: usize },
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPort { name, value } => {
                write!(f, "Invalid port for {}: {} (must be 1-65535)", name, value)
            }
            Self::InvalidPoolSize { min, max } => {
                write!(
                    f,
                    "Invalid pool size: min ({}) cannot be greater than max ({})",
                    min, max
                )
            }
            Self::PoolSizeTooLarge { value, maximum } => {
                write!(
                    f,
                    "Pool size {} exceeds maximum allowed ({})",
                    value, maximum
                )
            }
            Self::InvalidUrl { url_type, message } => {
                write!(f, "Invalid {} URL: {}", url_type, message)
            }
            Self::NonPositiveTimeout { name, value } => {
                write!(f, "{} must be positive, got {}", name, value)
            }
            Self::InvalidBatchSize { value, maximum } => {
                write!(f, "Batch size {} must be between 1 and {}", value, maximum)
            }
            Self::InvalidMaxRetries { value } => {
                write!(f, "max_retries must be at least 1, got {}", value)
            }
            Self::InvalidThresholds { warning, critical } => {
                write!(
                    f,
                    "Health thresholds must satisfy 0 < warning ({}) <= critical ({}) <= 1",
                    warning, critical
                )
            }
            Self::EmptyHealthKey => {
                write!(f, "health_check_type and health_check_name cannot be empty")
            }
            Self::MissingWebhookUrl => {
                write!(f, "alerting.webhook_url is required when sink is webhook")
            }
            Self::TriggerTokenTooShort { actual, minimum } => {
                write!(
                    f,
                    "Trigger token too short: {} characters (minimum {})",
                    actual, minimum
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}

/// Result of configuration validation containing all errors found.
#[derive(Debug)]
pub struct ValidationResult {
    errors: Vec<ConfigValidationError>,
}

impl ValidationResult {
    fn new() -> Self {
        Self { errors: Vec::new() }
    }

    fn add_error(&mut self, error: ConfigValidationError) {
        self.errors.push(error);
    }

    /// Converts to Result, returning Err with all errors if any exist.
    pub fn into_result(self) -> Result<(), Vec<ConfigValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Maximum connection pool size.
    const MAX_POOL_SIZE: u32 = 200;
    /// Maximum jobs per invocation.
    pub const MAX_BATCH_SIZE: u32 = 10_000;
    /// Minimum trigger token length.
    const MIN_TRIGGER_TOKEN_LENGTH: usize = 16;

    /// Validates the entire application configuration.
    ///
    /// Returns Ok(()) if valid, or Err with all validation errors found.
    pub fn validate(config: &AppConfig) -> Result<(), Vec<ConfigValidationError>> {
        let mut result = ValidationResult::new();

        Self::validate_server(&config.server, &mut result);
        Self::validate_database(&config.database, &mut result);
        Self::validate_processor(&config.processor, &mut result);
        Self::validate_alerting(&config.alerting, &mut result);

        result.into_result()
    }

    fn validate_server(config: &crate::ServerConfig, result: &mut ValidationResult) {
        if config.port == 0 {
            result.add_error(ConfigValidationError::InvalidPort {
                name: "server.port".to_string(),
                value: config.port,
            });
        }

        if config.request_timeout_secs == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "server.request_timeout_secs".to_string(),
                value: 0,
            });
        }

        if let Some(ref token) = config.trigger_token {
            if token.len() < Self::MIN_TRIGGER_TOKEN_LENGTH {
                result.add_error(ConfigValidationError::TriggerTokenTooShort {
                    actual: token.len(),
                    minimum: Self::MIN_TRIGGER_TOKEN_LENGTH,
                });
            }
        }
    }

    fn validate_database(config: &crate::DatabaseConfig, result: &mut ValidationResult) {
        if config.url.is_empty() {
            result.add_error(ConfigValidationError::InvalidUrl {
                url_type: "database".to_string(),
                message: "URL cannot be empty".to_string(),
            });
        } else if !config.url.starts_with("mysql://") && !config.url.starts_with("mariadb://") {
            result.add_error(ConfigValidationError::InvalidUrl {
                url_type: "database".to_string(),
                message: "URL must start with mysql:// or mariadb://".to_string(),
            });
        }

        if config.min_connections > config.max_connections {
            result.add_error(ConfigValidationError::InvalidPoolSize {
                min: config.min_connections,
                max: config.max_connections,
            });
        }
        if config.max_connections > Self::MAX_POOL_SIZE {
            result.add_error(ConfigValidationError::PoolSizeTooLarge {
                value: config.max_connections,
                maximum: Self::MAX_POOL_SIZE,
            });
        }

        if config.connect_timeout_secs == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "database.connect_timeout_secs".to_string(),
                value: 0,
            });
        }
    }

    fn validate_processor(config: &crate::ProcessorConfig, result: &mut ValidationResult) {
        if config.batch_size == 0 || config.batch_size > Self::MAX_BATCH_SIZE {
            result.add_error(ConfigValidationError::InvalidBatchSize {
                value: config.batch_size,
                maximum: Self::MAX_BATCH_SIZE,
            });
        }

        if config.max_retries == 0 {
            result.add_error(ConfigValidationError::InvalidMaxRetries {
                value: config.max_retries,
            });
        }

        if config.lock_timeout_secs == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "processor.lock_timeout_secs".to_string(),
                value: 0,
            });
        }
        if config.expire_after_hours == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "processor.expire_after_hours".to_string(),
                value: 0,
            });
        }

        let (warning, critical) = (config.warning_threshold, config.critical_threshold);
        if !(warning > 0.0 && warning <= critical && critical <= 1.0) {
            result.add_error(ConfigValidationError::InvalidThresholds { warning, critical });
        }

        if config.health_check_type.trim().is_empty() || config.health_check_name.trim().is_empty() {
            result.add_error(ConfigValidationError::EmptyHealthKey);
        }
    }

    fn validate_alerting(config: &crate::AlertingConfig, result: &mut ValidationResult) {
        if !config.enabled || config.sink != AlertSinkKind::Webhook {
            return;
        }

        match config.webhook_url {
            None => result.add_error(ConfigValidationError::MissingWebhookUrl),
            Some(ref url) => {
                if Url::parse(url).is_err() {
                    result.add_error(ConfigValidationError::InvalidUrl {
                        url_type: "webhook".to_string(),
                        message: format!("Invalid URL format: {}", url),
                    });
                }
            }
        }

        if config.webhook_timeout_secs == 0 {
            result.add_error(ConfigValidationError::NonPositiveTimeout {
                name: "alerting.webhook_timeout_secs".to_string(),
                value: 0,
            });
        }
    }
}

/// Formats validation errors for display.
pub fn format_validation_errors(errors: &[ConfigValidationError]) -> String {
    let mut output = String::from("Configuration validation failed:\n");
    for (i, error) in errors.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, error));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes() {
        assert!(ConfigValidator::validate(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_batch_size() {
        let mut config = AppConfig::default();
        config.processor.batch_size = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigValidationError::InvalidBatchSize { value: 0, .. })));
    }

    #[test]
    fn test_zero_max_retries() {
        let mut config = AppConfig::default();
        config.processor.max_retries = 0;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors, vec![ConfigValidationError::InvalidMaxRetries { value: 0 }]);
    }

    #[test]
    fn test_inverted_thresholds() {
        let mut config = AppConfig::default();
        config.processor.warning_threshold = 0.2;
        config.processor.critical_threshold = 0.1;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigValidationError::InvalidThresholds { .. })));
    }

    #[test]
    fn test_threshold_above_one() {
        let mut config = AppConfig::default();
        config.processor.critical_threshold = 1.5;

        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_webhook_without_url() {
        let mut config = AppConfig::default();
        config.alerting.sink = AlertSinkKind::Webhook;

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors, vec![ConfigValidationError::MissingWebhookUrl]);
    }

    #[test]
    fn test_webhook_ignored_when_alerting_disabled() {
        let mut config = AppConfig::default();
        config.alerting.enabled = false;
        config.alerting.sink = AlertSinkKind::Webhook;

        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_invalid_webhook_url() {
        let mut config = AppConfig::default();
        config.alerting.sink = AlertSinkKind::Webhook;
        config.alerting.webhook_url = Some("not a url".to_string());

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(&errors[0], ConfigValidationError::InvalidUrl { url_type, .. } if url_type == "webhook"));
    }

    #[test]
    fn test_non_mysql_database_url() {
        let mut config = AppConfig::default();
        config.database.url = "postgres://localhost/opsdesk".to_string();

        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_short_trigger_token() {
        let mut config = AppConfig::default();
        config.server.trigger_token = Some("short".to_string());

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ConfigValidationError::TriggerTokenTooShort { actual: 5, minimum: 16 }]
        );
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        config.database.min_connections = 10;
        config.database.max_connections = 2;
        config.processor.lock_timeout_secs = 0;
        config.processor.health_check_name = " ".to_string();

        let errors = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_format_validation_errors() {
        let errors = vec![
            ConfigValidationError::InvalidMaxRetries { value: 0 },
            ConfigValidationError::MissingWebhookUrl,
        ];

        let formatted = format_validation_errors(&errors);
        assert!(formatted.starts_with("Configuration validation failed:"));
        assert!(formatted.contains("1. max_retries must be at least 1"));
        assert!(formatted.contains("2. alerting.webhook_url is required"));
    }
}
