use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::action::base::{fqid_field, id_field, Instance};
use crate::action::error::{ActionError, ActionResult};
use crate::auth::GUEST_USER_ID;
use crate::datastore::{DatastoreError, DatastoreView};
use crate::models::{Collection, Entity, Fqid};
use crate::permissions::catalog::{Permission, PermissionCatalog};

/// Global role of a user, ordered from least to most privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OrganisationManagementLevel {
    CanManageUsers,
    CanManageOrganisation,
    Superadmin,
}

impl OrganisationManagementLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganisationManagementLevel::CanManageUsers => "can_manage_users",
            OrganisationManagementLevel::CanManageOrganisation => "can_manage_organisation",
            OrganisationManagementLevel::Superadmin => "superadmin",
        }
    }
}

impl fmt::Display for OrganisationManagementLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrganisationManagementLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "can_manage_users" => Ok(OrganisationManagementLevel::CanManageUsers),
            "can_manage_organisation" => Ok(OrganisationManagementLevel::CanManageOrganisation),
            "superadmin" => Ok(OrganisationManagementLevel::Superadmin),
            other => Err(format!("unknown organisation management level {}", other)),
        }
    }
}

/// Where the meeting of a permission check comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingScope {
    /// Instance field holding the meeting id
    Field(&'static str),
    /// `meeting_id` of the entity named by the instance `id`
    Own,
    /// `meeting_id` of the entity referenced by an id field
    Reference {
        field: &'static str,
        collection: Collection,
    },
    /// `meeting_id` of the entity referenced by an fqid field
    Fqid(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionRequirement {
    None,
    Meeting {
        permission: Permission,
        scope: MeetingScope,
    },
    /// Manager of the committee referenced by `field`
    Committee { field: &'static str },
    Organisation(OrganisationManagementLevel),
}

impl fmt::Display for PermissionRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionRequirement::None => f.write_str("internal"),
            PermissionRequirement::Meeting { permission, .. } => write!(f, "{}", permission),
            PermissionRequirement::Committee { field } => write!(f, "committee manager ({})", field),
            PermissionRequirement::Organisation(level) => write!(f, "organisation {}", level),
        }
    }
}

#[derive(Debug, Default)]
struct Requester {
    level: Option<OrganisationManagementLevel>,
    group_ids: Value,
}

impl Requester {
    fn has_level(&self, level: OrganisationManagementLevel) -> bool {
        self.level.map(|own| own >= level).unwrap_or(false)
    }

    fn groups_in(&self, meeting_id: u64) -> Vec<u64> {
        self.group_ids
            .get(meeting_id.to_string())
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default()
    }
}

/// Resolves permission requirements against fresh datastore reads
#[derive(Debug, Clone)]
pub struct PermissionGate {
    catalog: Arc<PermissionCatalog>,
}

impl PermissionGate {
    pub fn new(catalog: Arc<PermissionCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &PermissionCatalog {
        &self.catalog
    }

    pub async fn check(
        &self,
        view: &mut DatastoreView,
        user_id: u64,
        action: &str,
        collection: Collection,
        requirement: &PermissionRequirement,
        instance: &Instance,
    ) -> ActionResult<()> {
        let requester = match requirement {
            PermissionRequirement::None => return Ok(()),
            _ => self.load_requester(view, user_id).await?,
        };
        if requester.has_level(OrganisationManagementLevel::Superadmin) {
            return Ok(());
        }

        match requirement {
            PermissionRequirement::None => Ok(()),
            PermissionRequirement::Organisation(level) => {
                if requester.has_level(*level) {
                    Ok(())
                } else {
                    Err(ActionError::permission_denied(action, level))
                }
            }
            PermissionRequirement::Committee { field } => {
                if requester.has_level(OrganisationManagementLevel::CanManageOrganisation) {
                    return Ok(());
                }
                let committee_id = id_field(instance, field)?;
                let committee = view
                    .get(Fqid::new(Collection::Committee, committee_id), &["manager_ids"])
                    .await?;
                let is_manager = committee
                    .get("manager_ids")
                    .and_then(Value::as_array)
                    .map(|ids| ids.iter().any(|id| id.as_u64() == Some(user_id)))
                    .unwrap_or(false);
                if user_id != GUEST_USER_ID && is_manager {
                    Ok(())
                } else {
                    Err(ActionError::permission_denied(action, "committee.can_manage"))
                }
            }
            PermissionRequirement::Meeting { permission, scope } => {
                let Some(meeting_id) = self.resolve_meeting(view, collection, scope, instance).await?
                else {
                    return Err(ActionError::permission_denied(action, permission));
                };
                if self
                    .has_meeting_permission(view, &requester, meeting_id, *permission)
                    .await?
                {
                    Ok(())
                } else {
                    Err(ActionError::permission_denied(action, permission))
                }
            }
        }
    }

    async fn load_requester(&self, view: &mut DatastoreView, user_id: u64) -> ActionResult<Requester> {
        if user_id == GUEST_USER_ID {
            return Ok(Requester::default());
        }
        let user = match view
            .get(
                Fqid::new(Collection::User, user_id),
                &["organisation_management_level", "group_ids"],
            )
            .await
        {
            Ok(user) => user,
            // an unknown requester holds no permissions
            Err(DatastoreError::NotFound(_)) => return Ok(Requester::default()),
            Err(e) => return Err(e.into()),
        };

        Ok(Requester {
            level: user
                .get("organisation_management_level")
                .and_then(Value::as_str)
                .and_then(|level| level.parse().ok()),
            group_ids: user.get("group_ids").cloned().unwrap_or(Value::Null),
        })
    }

    async fn resolve_meeting(
        &self,
        view: &mut DatastoreView,
        collection: Collection,
        scope: &MeetingScope,
        instance: &Instance,
    ) -> ActionResult<Option<u64>> {
        let entity = match scope {
            MeetingScope::Field(field) => return Ok(Some(id_field(instance, field)?)),
            MeetingScope::Own => {
                let id = id_field(instance, "id")?;
                Fqid::new(collection, id)
            }
            MeetingScope::Reference { field, collection } => {
                Fqid::new(*collection, id_field(instance, field)?)
            }
            MeetingScope::Fqid(field) => fqid_field(instance, field)?,
        };

        if entity.collection == Collection::Meeting {
            return Ok(Some(entity.id));
        }
        let data = view.get(entity, &["meeting_id"]).await?;
        Ok(meeting_of(&data))
    }

    async fn has_meeting_permission(
        &self,
        view: &mut DatastoreView,
        requester: &Requester,
        meeting_id: u64,
        permission: Permission,
    ) -> ActionResult<bool> {
        let group_ids = requester.groups_in(meeting_id);
        if group_ids.is_empty() {
            return Ok(false);
        }

        let meeting = view
            .get(Fqid::new(Collection::Meeting, meeting_id), &["admin_group_id"])
            .await?;
        let admin_group = meeting.get("admin_group_id").and_then(Value::as_u64);
        if admin_group.map(|admin| group_ids.contains(&admin)).unwrap_or(false) {
            return Ok(true);
        }

        let fqids: Vec<Fqid> = group_ids
            .iter()
            .map(|id| Fqid::new(Collection::Group, *id))
            .collect();
        let groups = view.get_many(&fqids, &["permissions"]).await?;
        let granted: HashSet<String> = groups
            .iter()
            .filter_map(|group| group.get("permissions").and_then(Value::as_array))
            .flatten()
            .filter_map(|p| p.as_str().map(str::to_string))
            .collect();

        Ok(self.catalog.is_granted(&granted, permission))
    }
}

fn meeting_of(entity: &Entity) -> Option<u64> {
    entity.get("meeting_id").and_then(Value::as_u64)
}
