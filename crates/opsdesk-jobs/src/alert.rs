//! Operator alerting on critical batch failure rates.

use crate::health::BatchCounts;
use crate::metrics::ProcessorMetrics;
use async_trait::async_trait;
use chrono::Utc;
use opsdesk_config::{AlertSinkKind, AlertingConfig};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Alert delivery failure. Logged by the caller, never propagated.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Transport error talking to the sink.
    #[error("Alert transport error: {0}")]
    Transport(String),

    /// The sink answered with a non-success status.
    #[error("Alert sink rejected the alert with status {status}")]
    Rejected { status: u16 },

    /// The sink could not be built from configuration.
    #[error("Alert configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for AlertError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => AlertError::Rejected {
                status: status.as_u16(),
            },
            None => AlertError::Transport(err.to_string()),
        }
    }
}

/// External notification channel.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Short sink name, used as a metric label.
    fn name(&self) -> &'static str;

    /// Delivers one alert.
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AlertError>;
}

/// Sink that writes alerts to the log at ERROR level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AlertError> {
        error!(recipient, subject, body, "ALERT");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookAlert<'a> {
    recipient: &'a str,
    subject: &'a str,
    body: &'a str,
    sent_at: String,
}

/// Sink that POSTs alerts as JSON.
pub struct WebhookAlertSink {
    client: Client,
    url: String,
}

impl WebhookAlertSink {
    /// Creates a webhook sink with a request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, AlertError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AlertError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), AlertError> {
        let payload = WebhookAlert {
            recipient,
            subject,
            body,
            sent_at: Utc::now().to_rfc3339(),
        };

        self.client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Builds the configured sink.
pub fn sink_from_config(config: &AlertingConfig) -> Result<Arc<dyn AlertSink>, AlertError> {
    match config.sink {
        AlertSinkKind::Log => Ok(Arc::new(LogAlertSink)),
        AlertSinkKind::Webhook => {
            let url = config
                .webhook_url
                .as_deref()
                .ok_or_else(|| AlertError::Configuration("webhook_url is required".to_string()))?;
            Ok(Arc::new(WebhookAlertSink::new(url, config.webhook_timeout())?))
        }
    }
}

/// What the alert check did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertOutcome {
    /// Failure rate at or below the critical threshold.
    NotRequired,
    /// Alerting is switched off.
    Disabled,
    Sent,
    /// Delivery failed; already logged.
    Failed,
}

/// Sends at most one alert per batch.
pub struct Alerter {
    sink: Arc<dyn AlertSink>,
    recipient: String,
    critical_threshold: f64,
    enabled: bool,
}

impl Alerter {
    /// Creates an alerter.
    pub fn new(sink: Arc<dyn AlertSink>, recipient: impl Into<String>, critical_threshold: f64) -> Self {
        Self {
            sink,
            recipient: recipient.into(),
            critical_threshold,
            enabled: true,
        }
    }

    /// Switches delivery on or off.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Alerts if the batch failure rate is above the critical threshold.
    pub async fn check(&self, counts: &BatchCounts) -> AlertOutcome {
        let rate = counts.failure_rate();
        if counts.processed == 0 || rate <= self.critical_threshold {
            return AlertOutcome::NotRequired;
        }
        if !self.enabled {
            info!(rate, "Critical failure rate, alerting disabled");
            return AlertOutcome::Disabled;
        }

        let subject = format!("Admin action queue critical: {:.1}% failure rate", rate * 100.0);
        let body = format!(
            "{} of {} admin actions failed in the last batch ({:.1}% failure rate, threshold {:.1}%).",
            counts.failed,
            counts.processed,
            rate * 100.0,
            self.critical_threshold * 100.0
        );

        match self.sink.send(&self.recipient, &subject, &body).await {
            Ok(()) => {
                ProcessorMetrics::alert(self.sink.name(), true);
                info!(sink = self.sink.name(), recipient = %self.recipient, "Critical failure alert sent");
                AlertOutcome::Sent
            }
            Err(e) => {
                ProcessorMetrics::alert(self.sink.name(), false);
                warn!(sink = self.sink.name(), error = %e, "Failed to send critical failure alert");
                AlertOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn counts(succeeded: u64, failed: u64) -> BatchCounts {
        BatchCounts {
            processed: succeeded + failed,
            succeeded,
            failed,
            skipped: 0,
            store_errors: 0,
        }
    }

    fn mock_sink() -> MockAlertSink {
        let mut sink = MockAlertSink::new();
        sink.expect_name().return_const("mock");
        sink
    }

    #[tokio::test]
    async fn test_alert_sent_once_above_critical() {
        let mut sink = mock_sink();
        sink.expect_send()
            .withf(|recipient: &str, subject: &str, body: &str| {
                recipient == "ops@example.com" && subject.contains("15.0%") && body.starts_with("3 of 20")
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let alerter = Alerter::new(Arc::new(sink), "ops@example.com", 0.10);
        assert_eq!(alerter.check(&counts(17, 3)).await, AlertOutcome::Sent);
    }

    #[tokio::test]
    async fn test_no_alert_at_threshold() {
        let mut sink = mock_sink();
        sink.expect_send().times(0);

        let alerter = Alerter::new(Arc::new(sink), "ops", 0.10);
        assert_eq!(alerter.check(&counts(9, 1)).await, AlertOutcome::NotRequired);
        assert_eq!(alerter.check(&counts(0, 0)).await, AlertOutcome::NotRequired);
    }

    #[tokio::test]
    async fn test_sink_failure_is_reported_not_raised() {
        let mut sink = mock_sink();
        sink.expect_send()
            .times(1)
            .returning(|_, _, _| Err(AlertError::Transport("connection refused".into())));

        let alerter = Alerter::new(Arc::new(sink), "ops", 0.10);
        assert_eq!(alerter.check(&counts(1, 1)).await, AlertOutcome::Failed);
    }

    #[tokio::test]
    async fn test_disabled_alerter_does_not_send() {
        let mut sink = mock_sink();
        sink.expect_send().times(0);

        let alerter = Alerter::new(Arc::new(sink), "ops", 0.10).enabled(false);
        assert_eq!(alerter.check(&counts(0, 5)).await, AlertOutcome::Disabled);
    }

    #[tokio::test]
    async fn test_webhook_sink_posts_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/alerts"))
            .and(body_partial_json(serde_json::json!({
                "recipient": "ops",
                "subject": "queue critical",
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let sink = WebhookAlertSink::new(format!("{}/alerts", server.uri()), Duration::from_secs(5)).unwrap();
        sink.send("ops", "queue critical", "3 of 20 failed").await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_sink_maps_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let sink = WebhookAlertSink::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = sink.send("ops", "s", "b").await.unwrap_err();
        assert!(matches!(err, AlertError::Rejected { status: 503 }));
    }

    #[test]
    fn test_sink_from_config() {
        let log = sink_from_config(&AlertingConfig::default()).unwrap();
        assert_eq!(log.name(), "log");

        let missing = AlertingConfig {
            sink: AlertSinkKind::Webhook,
            ..AlertingConfig::default()
        };
        assert!(sink_from_config(&missing).is_err());
    }
}
