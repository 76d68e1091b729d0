use async_trait::async_trait;
use serde_json::Value;

use crate::action::{Action, ActionKind, DefaultSchema, Instance, SchemaError};
use crate::models::Collection;
use crate::permissions::PermissionRequirement;

/// Internal `projection.create`, run by the projector actions
#[derive(Debug, Default)]
pub struct ProjectionCreate;

#[async_trait]
impl Action for ProjectionCreate {
    fn name(&self) -> &'static str {
        "projection.create"
    }

    fn collection(&self) -> Collection {
        Collection::Projection
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Create
    }

    fn schema(&self) -> Result<Value, SchemaError> {
        DefaultSchema::create(
            Collection::Projection,
            &["meeting_id", "content_object_id"],
            &[
                "options",
                "stable",
                "type",
                "weight",
                "current_projector_id",
                "preview_projector_id",
            ],
        )
        .build()
    }

    fn permission(&self, _instance: &Instance, _user_id: u64) -> PermissionRequirement {
        PermissionRequirement::None
    }

    fn is_internal(&self) -> bool {
        true
    }
}
