use async_trait::async_trait;
use serde_json::{json, Value};

use crate::action::{fqid_field, Action, ActionContext, ActionKind, ActionResult, DefaultSchema, Instance, SchemaError};
use crate::datastore::Filter;
use crate::models::schema::id_list_schema;
use crate::models::Collection;
use crate::permissions::{perms, MeetingScope, PermissionRequirement};

/// Projection fields copied from the request into every new projection
const COPIED_FIELDS: &[&str] = &["options", "stable", "type"];

/// `projector.add_to_preview`: appends a projection of one content object
/// to the preview queue of each given projector
#[derive(Debug, Default)]
pub struct ProjectorAddToPreview;

impl ProjectorAddToPreview {
    /// Weight for the next preview projection of `projector_id`
    async fn next_weight(ctx: &mut ActionContext, projector_id: u64) -> ActionResult<i64> {
        let filter = Filter::eq("preview_projector_id", projector_id);
        let max = ctx
            .datastore()
            .max(Collection::Projection, &filter, "weight")
            .await?;
        Ok(max.map(|weight| weight + 1).unwrap_or(1))
    }
}

#[async_trait]
impl Action for ProjectorAddToPreview {
    fn name(&self) -> &'static str {
        "projector.add_to_preview"
    }

    fn collection(&self) -> Collection {
        Collection::Projector
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Custom
    }

    fn schema(&self) -> Result<Value, SchemaError> {
        let mut ids = id_list_schema();
        ids["minItems"] = json!(1);
        DefaultSchema::new(Collection::Projection)
            .title("projector add_to_preview schema")
            .required_fields(&["content_object_id"])
            .optional_fields(COPIED_FIELDS)
            .additional_required("ids", ids)
            .build()
    }

    fn permission(&self, _instance: &Instance, _user_id: u64) -> PermissionRequirement {
        PermissionRequirement::Meeting {
            permission: perms::PROJECTOR_CAN_MANAGE,
            scope: MeetingScope::Fqid("content_object_id"),
        }
    }

    async fn get_updated_instances(
        &self,
        ctx: &mut ActionContext,
        instances: Vec<Instance>,
    ) -> ActionResult<Vec<Instance>> {
        for instance in instances {
            let content_object = fqid_field(&instance, "content_object_id")?;
            let meeting_id = ctx
                .datastore()
                .get(content_object, &["meeting_id"])
                .await?
                .get("meeting_id")
                .cloned()
                .unwrap_or(Value::Null);

            let projector_ids: Vec<u64> = instance
                .get("ids")
                .and_then(Value::as_array)
                .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
                .unwrap_or_default();

            for projector_id in projector_ids {
                let weight = Self::next_weight(ctx, projector_id).await?;
                let mut projection = json!({
                    "meeting_id": meeting_id,
                    "preview_projector_id": projector_id,
                    "weight": weight,
                    "content_object_id": content_object.to_string(),
                });
                for field in COPIED_FIELDS {
                    if let Some(value) = instance.get(*field).filter(|v| !v.is_null()) {
                        projection[*field] = value.clone();
                    }
                }
                ctx.execute_other_action("projection.create", vec![projection]).await?;
            }
        }
        Ok(Vec::new())
    }
}
