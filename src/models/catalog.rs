use once_cell::sync::Lazy;
use serde_json::json;

use crate::models::fields::{Field, FieldKind, RelationTarget};
use crate::models::fqid::Collection;

/// Field definitions of one collection
#[derive(Debug, Clone)]
pub struct Model {
    pub collection: Collection,
    fields: Vec<Field>,
}

impl Model {
    fn new(collection: Collection, fields: Vec<Field>) -> Self {
        Self { collection, fields }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        name == "id" || self.field(name).is_some()
    }

    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    pub fn relation_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter().filter(|field| field.is_relation())
    }
}

fn relation(collection: Collection, field: &'static str) -> FieldKind {
    FieldKind::Relation(RelationTarget::new(collection, field))
}

fn relation_list(collection: Collection, field: &'static str) -> FieldKind {
    FieldKind::RelationList(RelationTarget::new(collection, field))
}

static ORGANISATION: Lazy<Model> = Lazy::new(|| {
    Model::new(
        Collection::Organisation,
        vec![
            Field::new("name", FieldKind::Char),
            Field::new("description", FieldKind::HtmlStrict),
            Field::new("committee_ids", relation_list(Collection::Committee, "organisation_id")),
        ],
    )
});

static COMMITTEE: Lazy<Model> = Lazy::new(|| {
    Model::new(
        Collection::Committee,
        vec![
            Field::new("name", FieldKind::Char).required(),
            Field::new("description", FieldKind::HtmlStrict),
            Field::new("organisation_id", relation(Collection::Organisation, "committee_ids")),
            Field::new("meeting_ids", relation_list(Collection::Meeting, "committee_id")),
            Field::new("manager_ids", relation_list(Collection::User, "committee_as_manager_ids")),
        ],
    )
});

static MEETING: Lazy<Model> = Lazy::new(|| {
    Model::new(
        Collection::Meeting,
        vec![
            Field::new("name", FieldKind::Char).required().constraint("maxLength", json!(100)),
            Field::new("welcome_title", FieldKind::Char),
            Field::new("welcome_text", FieldKind::HtmlPermissive),
            Field::new("description", FieldKind::Char).constraint("maxLength", json!(100)),
            Field::new("location", FieldKind::Char),
            Field::new("start_time", FieldKind::Timestamp),
            Field::new("end_time", FieldKind::Timestamp),
            Field::new("committee_id", relation(Collection::Committee, "meeting_ids")).required(),
            Field::new("user_ids", FieldKind::NumberArray),
            Field::new("temporary_user_ids", relation_list(Collection::User, "meeting_id")),
            Field::new(
                "present_user_ids",
                relation_list(Collection::User, "is_present_in_meeting_ids"),
            ),
            Field::new("group_ids", relation_list(Collection::Group, "meeting_id")),
            Field::new(
                "admin_group_id",
                relation(Collection::Group, "admin_group_for_meeting_id"),
            ),
            Field::new(
                "default_group_id",
                relation(Collection::Group, "default_group_for_meeting_id"),
            ),
            Field::new("poll_ids", relation_list(Collection::Poll, "meeting_id")),
            Field::new("poll_couple_countdown", FieldKind::Boolean).default(json!(true)),
            Field::new(
                "poll_countdown_id",
                relation(Collection::ProjectorCountdown, "used_as_poll_countdown_meeting_id"),
            ),
            Field::new("projector_ids", relation_list(Collection::Projector, "meeting_id")),
            Field::new("all_projection_ids", relation_list(Collection::Projection, "meeting_id")),
            Field::new(
                "projector_countdown_ids",
                relation_list(Collection::ProjectorCountdown, "meeting_id"),
            ),
            Field::new(
                "projector_countdown_default_time",
                FieldKind::Integer,
            )
            .default(json!(60)),
            Field::new("assignment_ids", relation_list(Collection::Assignment, "meeting_id")),
            Field::new(
                "assignment_candidate_ids",
                relation_list(Collection::AssignmentCandidate, "meeting_id"),
            ),
        ],
    )
});

static USER: Lazy<Model> = Lazy::new(|| {
    Model::new(
        Collection::User,
        vec![
            Field::new("username", FieldKind::Char).required(),
            Field::new("title", FieldKind::Char),
            Field::new("first_name", FieldKind::Char),
            Field::new("last_name", FieldKind::Char),
            Field::new("is_active", FieldKind::Boolean),
            Field::new("is_physical_person", FieldKind::Boolean).default(json!(true)),
            Field::new("password", FieldKind::Char),
            Field::new("default_password", FieldKind::Char),
            Field::new("gender", FieldKind::Char),
            Field::new("email", FieldKind::Char),
            Field::new("default_number", FieldKind::Char),
            Field::new("default_structure_level", FieldKind::Char),
            Field::new("default_vote_weight", FieldKind::Decimal),
            Field::new("organisation_management_level", FieldKind::Char).constraint(
                "enum",
                json!(["superadmin", "can_manage_organisation", "can_manage_users"]),
            ),
            Field::new(
                "committee_as_manager_ids",
                relation_list(Collection::Committee, "manager_ids"),
            ),
            Field::new("meeting_id", relation(Collection::Meeting, "temporary_user_ids")),
            Field::new(
                "is_present_in_meeting_ids",
                relation_list(Collection::Meeting, "present_user_ids"),
            ),
            // per meeting
            Field::new("group_ids", relation_list(Collection::Group, "user_ids")).template(),
            Field::new(
                "vote_delegated_to_id",
                relation(Collection::User, "vote_delegations_from_ids"),
            )
            .template(),
            Field::new(
                "vote_delegations_from_ids",
                relation_list(Collection::User, "vote_delegated_to_id"),
            )
            .template(),
            Field::new("comment", FieldKind::HtmlStrict).template(),
            Field::new("number", FieldKind::Char).template(),
            Field::new("structure_level", FieldKind::Char).template(),
            Field::new("about_me", FieldKind::HtmlStrict).template(),
            Field::new("vote_weight", FieldKind::Decimal).template(),
            Field::new(
                "assignment_candidate_ids",
                relation_list(Collection::AssignmentCandidate, "user_id"),
            )
            .template(),
        ],
    )
});

static GROUP: Lazy<Model> = Lazy::new(|| {
    Model::new(
        Collection::Group,
        vec![
            Field::new("name", FieldKind::Char).required(),
            Field::new("permissions", FieldKind::CharArray),
            Field::new("meeting_id", relation(Collection::Meeting, "group_ids")).required(),
            Field::new("user_ids", relation_list(Collection::User, "group_ids")),
            Field::new(
                "admin_group_for_meeting_id",
                relation(Collection::Meeting, "admin_group_id"),
            ),
            Field::new(
                "default_group_for_meeting_id",
                relation(Collection::Meeting, "default_group_id"),
            ),
        ],
    )
});

static POLL: Lazy<Model> = Lazy::new(|| {
    Model::new(
        Collection::Poll,
        vec![
            Field::new("title", FieldKind::Char),
            Field::new("type", FieldKind::Char)
                .constraint("enum", json!(["analog", "named", "pseudoanonymous"])),
            Field::new("pollmethod", FieldKind::Char),
            Field::new("state", FieldKind::Char)
                .constraint("enum", json!(["created", "started", "finished", "published"]))
                .default(json!("created")),
            Field::new("meeting_id", relation(Collection::Meeting, "poll_ids")).required(),
            Field::new(
                "content_object_id",
                FieldKind::GenericRelation(vec![RelationTarget::new(
                    Collection::Assignment,
                    "poll_ids",
                )]),
            )
            .equal_meeting(),
            Field::new(
                "projection_ids",
                relation_list(Collection::Projection, "content_object_id"),
            ),
        ],
    )
});

static PROJECTOR: Lazy<Model> = Lazy::new(|| {
    Model::new(
        Collection::Projector,
        vec![
            Field::new("name", FieldKind::Char),
            Field::new("scale", FieldKind::Integer),
            Field::new("meeting_id", relation(Collection::Meeting, "projector_ids")).required(),
            Field::new(
                "current_projection_ids",
                relation_list(Collection::Projection, "current_projector_id"),
            ),
            Field::new(
                "preview_projection_ids",
                relation_list(Collection::Projection, "preview_projector_id"),
            ),
        ],
    )
});

static PROJECTION: Lazy<Model> = Lazy::new(|| {
    Model::new(
        Collection::Projection,
        vec![
            Field::new("options", FieldKind::Json),
            Field::new("stable", FieldKind::Boolean).default(json!(false)),
            Field::new("type", FieldKind::Char),
            Field::new("weight", FieldKind::Integer),
            Field::new("meeting_id", relation(Collection::Meeting, "all_projection_ids")).required(),
            Field::new(
                "current_projector_id",
                relation(Collection::Projector, "current_projection_ids"),
            )
            .equal_meeting(),
            Field::new(
                "preview_projector_id",
                relation(Collection::Projector, "preview_projection_ids"),
            )
            .equal_meeting(),
            Field::new(
                "content_object_id",
                FieldKind::GenericRelation(vec![
                    RelationTarget::new(Collection::Assignment, "projection_ids"),
                    RelationTarget::new(Collection::Poll, "projection_ids"),
                ]),
            )
            .required()
            .equal_meeting(),
        ],
    )
});

static PROJECTOR_COUNTDOWN: Lazy<Model> = Lazy::new(|| {
    Model::new(
        Collection::ProjectorCountdown,
        vec![
            Field::new("title", FieldKind::Char).required(),
            Field::new("description", FieldKind::Char),
            Field::new("default_time", FieldKind::Integer).constraint("minimum", json!(0)),
            Field::new("countdown_time", FieldKind::Float),
            Field::new("running", FieldKind::Boolean).default(json!(false)),
            Field::new(
                "meeting_id",
                relation(Collection::Meeting, "projector_countdown_ids"),
            )
            .required(),
            Field::new(
                "used_as_poll_countdown_meeting_id",
                relation(Collection::Meeting, "poll_countdown_id"),
            ),
        ],
    )
});

static ASSIGNMENT: Lazy<Model> = Lazy::new(|| {
    Model::new(
        Collection::Assignment,
        vec![
            Field::new("title", FieldKind::Char).required(),
            Field::new("description", FieldKind::HtmlStrict),
            Field::new("phase", FieldKind::Char)
                .constraint("enum", json!(["search", "voting", "finished"]))
                .default(json!("search")),
            Field::new("open_posts", FieldKind::Integer).constraint("minimum", json!(0)),
            Field::new("meeting_id", relation(Collection::Meeting, "assignment_ids")).required(),
            Field::new(
                "candidate_ids",
                relation_list(Collection::AssignmentCandidate, "assignment_id"),
            ),
            Field::new("poll_ids", relation_list(Collection::Poll, "content_object_id")),
            Field::new(
                "projection_ids",
                relation_list(Collection::Projection, "content_object_id"),
            ),
        ],
    )
});

static ASSIGNMENT_CANDIDATE: Lazy<Model> = Lazy::new(|| {
    Model::new(
        Collection::AssignmentCandidate,
        vec![
            Field::new("weight", FieldKind::Integer).default(json!(10000)),
            Field::new(
                "assignment_id",
                relation(Collection::Assignment, "candidate_ids"),
            )
            .required()
            .equal_meeting(),
            Field::new("user_id", relation(Collection::User, "assignment_candidate_ids")),
            Field::new(
                "meeting_id",
                relation(Collection::Meeting, "assignment_candidate_ids"),
            )
            .required(),
        ],
    )
});

/// Look up the model of a collection
pub fn model(collection: Collection) -> &'static Model {
    match collection {
        Collection::Organisation => &ORGANISATION,
        Collection::Committee => &COMMITTEE,
        Collection::Meeting => &MEETING,
        Collection::User => &USER,
        Collection::Group => &GROUP,
        Collection::Poll => &POLL,
        Collection::Projector => &PROJECTOR,
        Collection::Projection => &PROJECTION,
        Collection::ProjectorCountdown => &PROJECTOR_COUNTDOWN,
        Collection::Assignment => &ASSIGNMENT,
        Collection::AssignmentCandidate => &ASSIGNMENT_CANDIDATE,
    }
}

/// Check that every relation field has a matching back-reference field.
///
/// Returns one message per broken relation; an empty catalog check passes.
pub fn verify_relations() -> Result<(), Vec<String>> {
    let mut problems = Vec::new();

    for collection in Collection::ALL {
        for field in model(collection).relation_fields() {
            for target in field.relation_targets() {
                let Some(back) = model(target.collection).field(target.field) else {
                    problems.push(format!(
                        "{}/{} points to missing field {}/{}",
                        collection, field.name, target.collection, target.field
                    ));
                    continue;
                };
                let points_back = back
                    .relation_targets()
                    .iter()
                    .any(|t| t.collection == collection && t.field == field.name);
                if !points_back {
                    problems.push(format!(
                        "{}/{} does not point back to {}/{}",
                        target.collection, target.field, collection, field.name
                    ));
                }
            }
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}
