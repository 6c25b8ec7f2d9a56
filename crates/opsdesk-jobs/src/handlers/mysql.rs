//! Reference handlers writing the admin tables through a [`MySqlUnit`].

use super::payloads::{
    ModuleTogglePayload, PageUpdatePayload, PayrollRecalculationPayload, PayrollUpdatePayload,
    SeoUpdatePayload, SettingsUpdatePayload,
};
use crate::clock;
use crate::error::HandlerError;
use crate::handler::{parse_payload, ActionHandler};
use crate::job::{ActionOutcome, ActionType, RequesterContext};
use crate::mysql::MySqlUnit;
use async_trait::async_trait;
use opsdesk_repository::mysql::{feature_modules, pages, payroll, seo, settings};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

/// Writes one or more `site_settings` keys.
#[derive(Debug, Default, Clone, Copy)]
pub struct SettingsUpdateHandler;

#[async_trait]
impl ActionHandler<MySqlUnit> for SettingsUpdateHandler {
    fn action_type(&self) -> ActionType {
        ActionType::SettingsUpdate
    }

    async fn handle(
        &self,
        unit: &mut MySqlUnit,
        payload: &JsonValue,
        ctx: &RequesterContext,
    ) -> Result<ActionOutcome, HandlerError> {
        let payload: SettingsUpdatePayload = parse_payload(payload)?;
        let now = clock::now();

        let mut keys = Vec::with_capacity(payload.settings.len());
        for change in &payload.settings {
            settings::upsert(unit.conn(), &change.key, &change.value, ctx.requester_id.0, now).await?;
            keys.push(change.key.clone());
        }
        debug!(count = keys.len(), "Site settings written");

        Ok(ActionOutcome::new(
            format!("site_settings:{}", keys.join(",")),
            json!({ "updated": keys }),
        ))
    }
}

/// Creates or edits a CMS page.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageUpdateHandler;

#[async_trait]
impl ActionHandler<MySqlUnit> for PageUpdateHandler {
    fn action_type(&self) -> ActionType {
        ActionType::PageUpdate
    }

    async fn handle(
        &self,
        unit: &mut MySqlUnit,
        payload: &JsonValue,
        ctx: &RequesterContext,
    ) -> Result<ActionOutcome, HandlerError> {
        let payload: PageUpdatePayload = parse_payload(payload)?;
        let write = pages::PageWrite {
            slug: &payload.slug,
            title: &payload.title,
            body: &payload.body,
            published: payload.published,
        };
        pages::upsert(unit.conn(), &write, ctx.requester_id.0, clock::now()).await?;

        let revision = pages::find(unit.conn(), &payload.slug)
            .await?
            .map(|page| page.revision)
            .ok_or_else(|| HandlerError::TargetNotFound(format!("cms_page {}", payload.slug)))?;

        Ok(ActionOutcome::new(
            format!("cms_pages:{}", payload.slug),
            json!({ "slug": payload.slug, "revision": revision, "published": payload.published }),
        ))
    }
}

/// Switches a feature module on or off.
#[derive(Debug, Default, Clone, Copy)]
pub struct ModuleToggleHandler;

#[async_trait]
impl ActionHandler<MySqlUnit> for ModuleToggleHandler {
    fn action_type(&self) -> ActionType {
        ActionType::ModuleToggle
    }

    async fn handle(
        &self,
        unit: &mut MySqlUnit,
        payload: &JsonValue,
        ctx: &RequesterContext,
    ) -> Result<ActionOutcome, HandlerError> {
        let payload: ModuleTogglePayload = parse_payload(payload)?;
        feature_modules::set_enabled(
            unit.conn(),
            &payload.module,
            payload.enabled,
            ctx.requester_id.0,
            clock::now(),
        )
        .await?;

        Ok(ActionOutcome::new(
            format!("feature_modules:{}", payload.module),
            json!({ "module": payload.module, "enabled": payload.enabled }),
        ))
    }
}

/// Writes payroll lines for a period.
#[derive(Debug, Default, Clone, Copy)]
pub struct PayrollUpdateHandler;

#[async_trait]
impl ActionHandler<MySqlUnit> for PayrollUpdateHandler {
    fn action_type(&self) -> ActionType {
        ActionType::PayrollUpdate
    }

    async fn handle(
        &self,
        unit: &mut MySqlUnit,
        payload: &JsonValue,
        ctx: &RequesterContext,
    ) -> Result<ActionOutcome, HandlerError> {
        let payload: PayrollUpdatePayload = parse_payload(payload)?;
        let now = clock::now();

        for line in &payload.entries {
            let write = payroll::PayrollWrite {
                period: &payload.period,
                employee_id: line.employee_id,
                hours_worked: line.hours_worked,
                hourly_rate: line.hourly_rate,
                adjustments: line.adjustments,
            };
            payroll::upsert(unit.conn(), &write, ctx.requester_id.0, now).await?;
        }

        Ok(ActionOutcome::new(
            format!("payroll_entries:{}", payload.period),
            json!({ "period": payload.period, "lines": payload.entries.len() }),
        ))
    }
}

/// Recomputes gross amounts for a payroll period.
#[derive(Debug, Default, Clone, Copy)]
pub struct PayrollRecalculationHandler;

#[async_trait]
impl ActionHandler<MySqlUnit> for PayrollRecalculationHandler {
    fn action_type(&self) -> ActionType {
        ActionType::PayrollRecalculation
    }

    async fn handle(
        &self,
        unit: &mut MySqlUnit,
        payload: &JsonValue,
        ctx: &RequesterContext,
    ) -> Result<ActionOutcome, HandlerError> {
        let payload: PayrollRecalculationPayload = parse_payload(payload)?;

        let lines = payroll::count_period(unit.conn(), &payload.period).await?;
        if lines == 0 {
            return Err(HandlerError::TargetNotFound(format!("payroll period {}", payload.period)));
        }
        let changed = payroll::recalculate_period(unit.conn(), &payload.period, ctx.requester_id.0, clock::now()).await?;

        Ok(ActionOutcome::new(
            format!("payroll_entries:{}", payload.period),
            json!({ "period": payload.period, "lines": lines, "changed": changed }),
        ))
    }
}

/// Patches SEO metadata for a path.
#[derive(Debug, Default, Clone, Copy)]
pub struct SeoUpdateHandler;

#[async_trait]
impl ActionHandler<MySqlUnit> for SeoUpdateHandler {
    fn action_type(&self) -> ActionType {
        ActionType::SeoUpdate
    }

    async fn handle(
        &self,
        unit: &mut MySqlUnit,
        payload: &JsonValue,
        ctx: &RequesterContext,
    ) -> Result<ActionOutcome, HandlerError> {
        let payload: SeoUpdatePayload = parse_payload(payload)?;
        if payload.is_empty() {
            return Err(HandlerError::InvalidPayload(format!(
                "seo update for {} changes nothing",
                payload.path
            )));
        }

        let write = seo::SeoWrite {
            path: &payload.path,
            meta_title: payload.meta_title.as_deref(),
            meta_description: payload.meta_description.as_deref(),
            canonical_url: payload.canonical_url.as_deref(),
            noindex: payload.noindex,
        };
        seo::upsert(unit.conn(), &write, ctx.requester_id.0, clock::now()).await?;

        Ok(ActionOutcome::new(
            format!("seo_metadata:{}", payload.path),
            json!({ "path": payload.path }),
        ))
    }
}
