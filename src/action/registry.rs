use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::action::base::Action;
use crate::action::error::ActionError;
use crate::action::schema::{SchemaError, SchemaValidator};
use crate::models;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Action {0} is registered twice")]
    Duplicate(String),

    #[error("Schema of action {action} is invalid: {source}")]
    Schema {
        action: String,
        #[source]
        source: SchemaError,
    },

    #[error("Model catalog is inconsistent: {0}")]
    Models(String),
}

/// An action together with its compiled instance schema
pub struct RegisteredAction {
    pub action: Arc<dyn Action>,
    pub validator: SchemaValidator,
}

/// Name to handler table, built once before the servers accept traffic
#[derive(Default)]
pub struct ActionRegistry {
    actions: BTreeMap<&'static str, RegisteredAction>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every implemented action; fails on any schema or
    /// model catalog error
    pub fn build() -> Result<Self, RegistryError> {
        models::verify_relations().map_err(|errors| RegistryError::Models(errors.join("; ")))?;

        let mut registry = Self::new();
        crate::actions::register_all(&mut registry)?;
        tracing::info!("Registered {} actions", registry.len());
        Ok(registry)
    }

    pub fn register(&mut self, action: impl Action + 'static) -> Result<(), RegistryError> {
        let name = action.name();
        if self.actions.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        let schema_error = |source| RegistryError::Schema {
            action: name.to_string(),
            source,
        };
        let schema = action.schema().map_err(schema_error)?;
        let validator = SchemaValidator::compile(schema).map_err(schema_error)?;

        tracing::debug!("Registering action {} ({})", name, action.kind());
        self.actions.insert(
            name,
            RegisteredAction {
                action: Arc::new(action),
                validator,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RegisteredAction> {
        self.actions.get(name)
    }

    /// Lookup for client requests; internal actions are hidden
    pub fn get_public(&self, name: &str) -> Result<&RegisteredAction, ActionError> {
        self.actions
            .get(name)
            .filter(|registered| !registered.action.is_internal())
            .ok_or_else(|| ActionError::action(format!("Action {} does not exist.", name)))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegisteredAction> {
        self.actions.values()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
