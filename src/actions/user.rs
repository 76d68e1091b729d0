use async_trait::async_trait;
use serde_json::{json, Value};

use crate::action::{id_field, Action, ActionContext, ActionError, ActionKind, ActionResult, DefaultSchema, Instance, SchemaError};
use crate::auth::password::hash_password;
use crate::datastore::Filter;
use crate::models::{Collection, Entity, Fqid};
use crate::permissions::{perms, MeetingScope, OrganisationManagementLevel, PermissionRequirement};

/// Plain user fields a temporary user accepts
const TEMPORARY_FIELDS: &[&str] = &[
    "title",
    "first_name",
    "last_name",
    "is_active",
    "is_physical_person",
    "gender",
    "default_number",
    "default_structure_level",
    "email",
    "default_vote_weight",
    "is_present_in_meeting_ids",
    "default_password",
];

/// Per-meeting fields, sent as plain values and stored under the meeting id
const TEMPORARY_MEETING_FIELDS: &[&str] = &[
    "group_ids",
    "vote_delegations_from_ids",
    "comment",
    "number",
    "structure_level",
    "about_me",
    "vote_weight",
];

fn user_fqid(id: u64) -> Fqid {
    Fqid::new(Collection::User, id)
}

/// Fail if another user already has `username`
async fn check_unique_username(
    ctx: &mut ActionContext,
    username: &str,
    own_id: Option<u64>,
) -> ActionResult<()> {
    let mut filter = Filter::eq("username", username);
    if let Some(id) = own_id {
        filter = Filter::and(vec![filter, Filter::ne("id", id)]);
    }
    if ctx.datastore().exists_where(Collection::User, &filter).await? {
        return Err(ActionError::action(format!(
            "A user with the username {} already exists.",
            username
        )));
    }
    Ok(())
}

/// Shared checks of create and update, then nest the meeting fields
async fn prepare_temporary(
    ctx: &mut ActionContext,
    instance: &mut Instance,
    meeting_id: u64,
) -> ActionResult<()> {
    if let Some(present) = instance.get("is_present_in_meeting_ids").and_then(Value::as_array) {
        if present.iter().any(|id| id.as_u64() != Some(meeting_id)) {
            return Err(ActionError::action(
                "A temporary user can only be present in its respective meeting.",
            ));
        }
    }

    let group_ids: Vec<u64> = instance
        .get("group_ids")
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
        .unwrap_or_default();
    for group_id in group_ids {
        let group = ctx
            .datastore()
            .get(Fqid::new(Collection::Group, group_id), &["meeting_id"])
            .await?;
        if group.get("meeting_id").and_then(Value::as_u64) != Some(meeting_id) {
            return Err(ActionError::action(format!(
                "Group {} is not in the meeting of the temporary user.",
                group_id
            )));
        }
    }

    let scope = meeting_id.to_string();
    for field in TEMPORARY_MEETING_FIELDS {
        if let Some(value) = instance.remove(*field) {
            instance.insert(field.to_string(), json!({ scope.as_str(): value }));
        }
    }
    Ok(())
}

/// Meeting of a temporary user, or the "not temporary" error
async fn temporary_meeting(ctx: &mut ActionContext, user_id: u64) -> ActionResult<u64> {
    let user = ctx.datastore().get(user_fqid(user_id), &["meeting_id"]).await?;
    user.get("meeting_id")
        .and_then(Value::as_u64)
        .ok_or_else(|| ActionError::action(format!("User {} is not temporary.", user_id)))
}

async fn update_meeting_user_ids(
    ctx: &mut ActionContext,
    meeting_id: u64,
    user_id: u64,
    add: bool,
) -> ActionResult<()> {
    let fqid = Fqid::new(Collection::Meeting, meeting_id);
    let meeting = ctx.datastore().get(fqid, &["user_ids"]).await?;
    let mut user_ids: Vec<Value> = meeting
        .get("user_ids")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let id = Value::from(user_id);
    if add {
        if !user_ids.contains(&id) {
            user_ids.push(id);
        }
    } else {
        user_ids.retain(|existing| existing != &id);
    }

    let mut fields = Entity::new();
    fields.insert("user_ids".to_string(), Value::Array(user_ids));
    ctx.queue_update(fqid, fields);
    Ok(())
}

#[derive(Debug, Default)]
pub struct UserCreateTemporary;

#[async_trait]
impl Action for UserCreateTemporary {
    fn name(&self) -> &'static str {
        "user.create_temporary"
    }

    fn collection(&self) -> Collection {
        Collection::User
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Create
    }

    fn schema(&self) -> Result<Value, SchemaError> {
        DefaultSchema::create(Collection::User, &["username", "meeting_id"], TEMPORARY_FIELDS)
            .title("user create_temporary schema")
            .optional_unscoped_fields(TEMPORARY_MEETING_FIELDS)
            .build()
    }

    fn permission(&self, _instance: &Instance, _user_id: u64) -> PermissionRequirement {
        PermissionRequirement::Meeting {
            permission: perms::USER_CAN_MANAGE,
            scope: MeetingScope::Field("meeting_id"),
        }
    }

    async fn update_instance(&self, ctx: &mut ActionContext, mut instance: Instance) -> ActionResult<Instance> {
        let meeting_id = id_field(&instance, "meeting_id")?;
        if let Some(username) = instance.get("username").and_then(Value::as_str) {
            check_unique_username(ctx, username, None).await?;
        }
        prepare_temporary(ctx, &mut instance, meeting_id).await?;
        Ok(instance)
    }

    async fn after_write(&self, ctx: &mut ActionContext, fqid: Fqid, instance: &Instance) -> ActionResult<()> {
        update_meeting_user_ids(ctx, id_field(instance, "meeting_id")?, fqid.id, true).await
    }
}

#[derive(Debug, Default)]
pub struct UserUpdateTemporary;

#[async_trait]
impl Action for UserUpdateTemporary {
    fn name(&self) -> &'static str {
        "user.update_temporary"
    }

    fn collection(&self) -> Collection {
        Collection::User
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Update
    }

    fn schema(&self) -> Result<Value, SchemaError> {
        DefaultSchema::update(Collection::User, &["username"])
            .title("user update_temporary schema")
            .optional_fields(TEMPORARY_FIELDS)
            .optional_unscoped_fields(TEMPORARY_MEETING_FIELDS)
            .build()
    }

    fn permission(&self, _instance: &Instance, _user_id: u64) -> PermissionRequirement {
        PermissionRequirement::Meeting {
            permission: perms::USER_CAN_MANAGE,
            scope: MeetingScope::Own,
        }
    }

    async fn update_instance(&self, ctx: &mut ActionContext, mut instance: Instance) -> ActionResult<Instance> {
        let user_id = id_field(&instance, "id")?;
        let meeting_id = temporary_meeting(ctx, user_id).await?;
        if let Some(username) = instance.get("username").and_then(Value::as_str) {
            check_unique_username(ctx, username, Some(user_id)).await?;
        }
        prepare_temporary(ctx, &mut instance, meeting_id).await?;
        Ok(instance)
    }
}

#[derive(Debug, Default)]
pub struct UserDeleteTemporary;

#[async_trait]
impl Action for UserDeleteTemporary {
    fn name(&self) -> &'static str {
        "user.delete_temporary"
    }

    fn collection(&self) -> Collection {
        Collection::User
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Delete
    }

    fn schema(&self) -> Result<Value, SchemaError> {
        DefaultSchema::delete(Collection::User)
            .title("user delete_temporary schema")
            .build()
    }

    fn permission(&self, _instance: &Instance, _user_id: u64) -> PermissionRequirement {
        PermissionRequirement::Meeting {
            permission: perms::USER_CAN_MANAGE,
            scope: MeetingScope::Own,
        }
    }

    async fn update_instance(&self, ctx: &mut ActionContext, mut instance: Instance) -> ActionResult<Instance> {
        let meeting_id = temporary_meeting(ctx, id_field(&instance, "id")?).await?;
        instance.insert("meeting_id".to_string(), Value::from(meeting_id));
        Ok(instance)
    }

    async fn after_write(&self, ctx: &mut ActionContext, fqid: Fqid, instance: &Instance) -> ActionResult<()> {
        update_meeting_user_ids(ctx, id_field(instance, "meeting_id")?, fqid.id, false).await
    }
}

/// `user.set_password`: stores a salted hash, optionally the default password
#[derive(Debug, Default)]
pub struct UserSetPassword;

#[async_trait]
impl Action for UserSetPassword {
    fn name(&self) -> &'static str {
        "user.set_password"
    }

    fn collection(&self) -> Collection {
        Collection::User
    }

    fn kind(&self) -> ActionKind {
        ActionKind::Update
    }

    fn schema(&self) -> Result<Value, SchemaError> {
        DefaultSchema::update(Collection::User, &[])
            .title("user set_password schema")
            .required_fields(&["password"])
            .additional_optional("set_as_default", json!({ "type": "boolean" }))
            .build()
    }

    fn permission(&self, _instance: &Instance, _user_id: u64) -> PermissionRequirement {
        PermissionRequirement::Organisation(OrganisationManagementLevel::CanManageUsers)
    }

    async fn update_instance(&self, _ctx: &mut ActionContext, mut instance: Instance) -> ActionResult<Instance> {
        let password = match instance.remove("password") {
            Some(Value::String(password)) => password,
            _ => return Err(ActionError::internal("password must be a string")),
        };
        let set_as_default = instance
            .remove("set_as_default")
            .and_then(|value| value.as_bool())
            .unwrap_or(false);

        instance.insert("password".to_string(), Value::String(hash_password(&password)));
        if set_as_default {
            instance.insert("default_password".to_string(), Value::String(password));
        }
        Ok(instance)
    }
}
