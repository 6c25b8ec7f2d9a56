//! Typed payloads for each action type.
//!
//! Enqueuers write these as the job's JSON payload. Unknown fields are
//! rejected so a typo never silently turns into a no-op.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use validator::{Validate, ValidationError};

/// `settings_update`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SettingsUpdatePayload {
    #[validate(length(min = 1, max = 100), nested)]
    pub settings: Vec<SettingChange>,
}

/// One setting in a [`SettingsUpdatePayload`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SettingChange {
    #[validate(length(min = 1, max = 128))]
    pub key: String,
    pub value: JsonValue,
}

/// `page_update`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PageUpdatePayload {
    #[validate(length(min = 1, max = 191), custom(function = "validate_slug"))]
    pub slug: String,
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub body: String,
    #[serde(default)]
    pub published: bool,
}

/// `module_toggle`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ModuleTogglePayload {
    #[validate(length(min = 1, max = 128))]
    pub module: String,
    pub enabled: bool,
}

/// `payroll_update`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PayrollUpdatePayload {
    #[validate(custom(function = "validate_period"))]
    pub period: String,
    #[validate(length(min = 1, max = 500), nested)]
    pub entries: Vec<PayrollLine>,
}

/// One employee line in a [`PayrollUpdatePayload`].
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PayrollLine {
    #[validate(range(min = 1))]
    pub employee_id: i64,
    #[validate(range(min = 0.0, max = 744.0))]
    pub hours_worked: f64,
    #[validate(range(min = 0.0))]
    pub hourly_rate: f64,
    #[serde(default)]
    pub adjustments: f64,
}

/// `payroll_recalculation`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct PayrollRecalculationPayload {
    #[validate(custom(function = "validate_period"))]
    pub period: String,
}

/// `seo_update`. Absent fields keep their stored value.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SeoUpdatePayload {
    #[validate(length(min = 1, max = 191), custom(function = "validate_path"))]
    pub path: String,
    #[validate(length(max = 255))]
    pub meta_title: Option<String>,
    #[validate(length(max = 512))]
    pub meta_description: Option<String>,
    #[validate(url)]
    pub canonical_url: Option<String>,
    pub noindex: Option<bool>,
}

impl SeoUpdatePayload {
    /// Returns true if the payload would change nothing.
    pub fn is_empty(&self) -> bool {
        self.meta_title.is_none()
            && self.meta_description.is_none()
            && self.canonical_url.is_none()
            && self.noindex.is_none()
    }
}

fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let valid = slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '/')
        && !slug.starts_with('/')
        && !slug.ends_with('/');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("slug"))
    }
}

fn validate_path(path: &str) -> Result<(), ValidationError> {
    if path.starts_with('/') && !path.contains(char::is_whitespace) {
        Ok(())
    } else {
        Err(ValidationError::new("path"))
    }
}

/// Payroll periods are `YYYY-MM`.
fn validate_period(period: &str) -> Result<(), ValidationError> {
    let well_formed = period.len() == 7
        && NaiveDate::parse_from_str(&format!("{}-01", period), "%Y-%m-%d").is_ok();
    if well_formed {
        Ok(())
    } else {
        Err(ValidationError::new("period"))
    }
}
