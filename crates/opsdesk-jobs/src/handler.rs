//! Action handlers and the typed registry that dispatches to them.

use crate::error::HandlerError;
use crate::job::{ActionOutcome, ActionType, RequesterContext};
use crate::store::UnitOfWork;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use validator::Validate;

/// Executes one kind of administrative action inside a unit of work.
///
/// Everything the handler writes must go through `unit`, so a failure (or a
/// lost claim) rolls it back together with the job transition.
#[async_trait]
pub trait ActionHandler<U: UnitOfWork>: Send + Sync {
    /// The action type this handler serves.
    fn action_type(&self) -> ActionType;

    /// Performs the action.
    async fn handle(
        &self,
        unit: &mut U,
        payload: &JsonValue,
        ctx: &RequesterContext,
    ) -> Result<ActionOutcome, HandlerError>;
}

/// Decodes and validates a typed payload.
pub fn parse_payload<T>(payload: &JsonValue) -> Result<T, HandlerError>
where
    T: DeserializeOwned + Validate,
{
    let parsed: T = serde_json::from_value(payload.clone())?;
    parsed.validate()?;
    Ok(parsed)
}

/// Maps each [`ActionType`] to its handler.
pub struct HandlerRegistry<U: UnitOfWork> {
    handlers: HashMap<ActionType, Arc<dyn ActionHandler<U>>>,
}

impl<U: UnitOfWork> HandlerRegistry<U> {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers a handler under its own action type, replacing any previous one.
    pub fn register<H>(&mut self, handler: H) -> &mut Self
    where
        H: ActionHandler<U> + 'static,
    {
        self.handlers.insert(handler.action_type(), Arc::new(handler));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<H>(mut self, handler: H) -> Self
    where
        H: ActionHandler<U> + 'static,
    {
        self.register(handler);
        self
    }

    /// Looks up the handler for `action_type`.
    pub fn get(&self, action_type: ActionType) -> Option<Arc<dyn ActionHandler<U>>> {
        self.handlers.get(&action_type).cloned()
    }

    /// Action types with no handler.
    pub fn missing(&self) -> Vec<ActionType> {
        ActionType::ALL
            .into_iter()
            .filter(|t| !self.handlers.contains_key(t))
            .collect()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<U: UnitOfWork> Default for HandlerRegistry<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U: UnitOfWork> Clone for HandlerRegistry<U> {
    fn clone(&self) -> Self {
        Self {
            handlers: self.handlers.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryUnit;
    use serde::Deserialize;
    use serde_json::json;

    struct Noop(ActionType);

    #[async_trait]
    impl ActionHandler<MemoryUnit> for Noop {
        fn action_type(&self) -> ActionType {
            self.0
        }

        async fn handle(
            &self,
            _unit: &mut MemoryUnit,
            _payload: &JsonValue,
            _ctx: &RequesterContext,
        ) -> Result<ActionOutcome, HandlerError> {
            Ok(ActionOutcome::new("noop", json!(null)))
        }
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Payload {
        #[validate(length(min = 1))]
        key: String,
    }

    #[test]
    fn test_register_and_lookup() {
        let registry = HandlerRegistry::<MemoryUnit>::new()
            .with(Noop(ActionType::SettingsUpdate))
            .with(Noop(ActionType::SeoUpdate));

        assert_eq!(registry.len(), 2);
        assert!(registry.get(ActionType::SettingsUpdate).is_some());
        assert!(registry.get(ActionType::PageUpdate).is_none());
        assert_eq!(
            registry.missing(),
            vec![
                ActionType::PageUpdate,
                ActionType::ModuleToggle,
                ActionType::PayrollUpdate,
                ActionType::PayrollRecalculation,
            ]
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = HandlerRegistry::<MemoryUnit>::default();
        assert!(registry.is_empty());
        registry.register(Noop(ActionType::SeoUpdate));
        registry.register(Noop(ActionType::SeoUpdate));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_parse_payload_validates() {
        let ok: Payload = parse_payload(&json!({"key": "site.name"})).unwrap();
        assert_eq!(ok.key, "site.name");

        let empty = parse_payload::<Payload>(&json!({"key": ""}));
        assert!(matches!(empty, Err(HandlerError::InvalidPayload(_))));

        let wrong_shape = parse_payload::<Payload>(&json!([1, 2]));
        assert!(matches!(wrong_shape, Err(HandlerError::InvalidPayload(_))));
    }
}
