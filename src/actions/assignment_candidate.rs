use async_trait::async_trait;
use serde_json::Value;

use crate::action::{id_field, Action, ActionContext, ActionError, ActionKind, ActionResult, DefaultSchema, Instance, SchemaError};
use crate::models::{Collection, Fqid};
use crate::permissions::{perms, MeetingScope, PermissionRequirement};

const PHASE_FINISHED: &str = "finished";

/// Nominating oneself needs a weaker permission than nominating others
fn nomination_permission(instance: &Instance, user_id: u64, scope: MeetingScope) -> PermissionRequirement {
    let permission = if instance.get("user_id").and_then(Value::as_u64) == Some(user_id) {
        perms::ASSIGNMENT_CAN_NOMINATE_SELF
    } else {
        perms::ASSIGNMENT_CAN_NOMINATE_OTHER
    };
    PermissionRequirement::Meeting { permission, scope }
}

async fn assignment_phase(ctx: &mut ActionContext, assignment_id: u64) -> ActionResult<(Option<String>, Value)> {
    let assignment = ctx
        .datastore()
        .get(Fqid::new(Collection::Assignment, assignment_id), &["phase", "meeting_id"])
        .await?;
    Ok((
        assignment.get("phase").and_then(Value::as_str).map(str::to_string),
        assignment.get("meeting_id").cloned().unwrap_or(Value::Null),
    ))
}

#[derive(Debug, Default)]
pub struct AssignmentCandidateCreate;

#[async_trait]
impl Action for AssignmentCandidateCreate {
    fn name(&self) -> &'static str {
        "assignment_candidate.create"
    }

    fn collection(&self) -> Collection {
        Collection::AssignmentCandidate
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Create
    }

    fn schema(&self) -> Result<Value, SchemaError> {
        DefaultSchema::create(Collection::AssignmentCandidate, &["assignment_id", "user_id"], &["weight"])
            .build()
    }

    fn permission(&self, instance: &Instance, user_id: u64) -> PermissionRequirement {
        nomination_permission(
            instance,
            user_id,
            MeetingScope::Reference {
                field: "assignment_id",
                collection: Collection::Assignment,
            },
        )
    }

    async fn update_instance(&self, ctx: &mut ActionContext, mut instance: Instance) -> ActionResult<Instance> {
        let assignment_id = id_field(&instance, "assignment_id")?;
        let (phase, meeting_id) = assignment_phase(ctx, assignment_id).await?;
        if phase.as_deref() == Some(PHASE_FINISHED) {
            return Err(ActionError::action(
                "It is not permitted to add a candidate to a finished assignment!",
            ));
        }
        instance.insert("meeting_id".to_string(), meeting_id);
        Ok(instance)
    }
}

#[derive(Debug, Default)]
pub struct AssignmentCandidateDelete;

#[async_trait]
impl Action for AssignmentCandidateDelete {
    fn name(&self) -> &'static str {
        "assignment_candidate.delete"
    }

    fn collection(&self) -> Collection {
        Collection::AssignmentCandidate
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Delete
    }

    fn schema(&self) -> Result<Value, SchemaError> {
        DefaultSchema::delete(Collection::AssignmentCandidate).build()
    }

    fn permission(&self, instance: &Instance, user_id: u64) -> PermissionRequirement {
        nomination_permission(instance, user_id, MeetingScope::Own)
    }

    async fn update_instance(&self, ctx: &mut ActionContext, instance: Instance) -> ActionResult<Instance> {
        let id = id_field(&instance, "id")?;
        let candidate = ctx
            .datastore()
            .get(Fqid::new(Collection::AssignmentCandidate, id), &["assignment_id"])
            .await?;
        if let Some(assignment_id) = candidate.get("assignment_id").and_then(Value::as_u64) {
            let (phase, _) = assignment_phase(ctx, assignment_id).await?;
            if phase.as_deref() == Some(PHASE_FINISHED) {
                return Err(ActionError::action(
                    "It is not permitted to remove a candidate from a finished assignment!",
                ));
            }
        }
        Ok(instance)
    }
}
