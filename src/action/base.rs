use async_trait::async_trait;
use serde_json::Value;
use std::fmt;

use crate::action::context::ActionContext;
use crate::action::error::{ActionError, ActionResult};
use crate::action::schema::SchemaError;
use crate::models::{Collection, Entity, Fqid};
use crate::permissions::PermissionRequirement;

/// One element of an action's `data` list
pub type Instance = Entity;

/// Positive integer id stored under `field`; anything else is a client error
pub fn id_field(instance: &Instance, field: &str) -> ActionResult<u64> {
    instance
        .get(field)
        .and_then(Value::as_u64)
        .filter(|id| *id > 0)
        .ok_or_else(|| ActionError::Validation(format!("{} must be a positive integer id", field)))
}

/// Fqid stored under `field`, rejecting unknown collections and ids outside u64
pub fn fqid_field(instance: &Instance, field: &str) -> ActionResult<Fqid> {
    let raw = instance
        .get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ActionError::Validation(format!("{} must be a fqid string", field)))?;
    raw.parse()
        .map_err(|err| ActionError::Validation(format!("{} is invalid. {}", field, err)))
}

/// Generic write behavior applied after `update_instance`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Create,
    Update,
    Delete,
    /// The handler queues its own writes
    Custom,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Create => "create",
            ActionKind::Update => "update",
            ActionKind::Delete => "delete",
            ActionKind::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// A named, schema-validated operation on one collection
#[async_trait]
pub trait Action: Send + Sync {
    /// Registered name, e.g. `poll.start`
    fn name(&self) -> &'static str;

    fn collection(&self) -> Collection;

    fn kind(&self) -> ActionKind;

    /// JSON schema of a single instance, compiled once at startup
    fn schema(&self) -> Result<Value, SchemaError>;

    /// Required permission, derived per instance and requesting user
    fn permission(&self, instance: &Instance, user_id: u64) -> PermissionRequirement;

    /// Internal actions can only be run by other actions
    fn is_internal(&self) -> bool {
        false
    }

    /// Transform one instance before the generic write behavior runs
    async fn update_instance(
        &self,
        _ctx: &mut ActionContext,
        instance: Instance,
    ) -> ActionResult<Instance> {
        Ok(instance)
    }

    /// Transform all instances; custom actions override this to produce writes
    async fn get_updated_instances(
        &self,
        ctx: &mut ActionContext,
        instances: Vec<Instance>,
    ) -> ActionResult<Vec<Instance>> {
        let mut updated = Vec::with_capacity(instances.len());
        for instance in instances {
            updated.push(self.update_instance(ctx, instance).await?);
        }
        Ok(updated)
    }

    /// Hook after the generic write of one instance was queued
    async fn after_write(
        &self,
        _ctx: &mut ActionContext,
        _fqid: Fqid,
        _instance: &Instance,
    ) -> ActionResult<()> {
        Ok(())
    }
}
