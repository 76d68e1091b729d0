use async_trait::async_trait;
use serde_json::Value;

use crate::action::{Action, ActionKind, DefaultSchema, Instance, SchemaError};
use crate::models::Collection;
use crate::permissions::{perms, MeetingScope, PermissionRequirement};

#[derive(Debug, Default)]
pub struct ProjectorCountdownUpdate;

#[async_trait]
impl Action for ProjectorCountdownUpdate {
    fn name(&self) -> &'static str {
        "projector_countdown.update"
    }

    fn collection(&self) -> Collection {
        Collection::ProjectorCountdown
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Update
    }

    fn schema(&self) -> Result<Value, SchemaError> {
        DefaultSchema::update(
            Collection::ProjectorCountdown,
            &["title", "description", "default_time", "countdown_time", "running"],
        )
        .build()
    }

    fn permission(&self, _instance: &Instance, _user_id: u64) -> PermissionRequirement {
        PermissionRequirement::Meeting {
            permission: perms::PROJECTOR_CAN_MANAGE,
            scope: MeetingScope::Own,
        }
    }
}
