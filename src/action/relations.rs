// Back-reference maintenance for relation fields

use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::action::error::{ActionError, ActionResult};
use crate::datastore::{DatastoreError, DatastoreView, WriteOperation};
use crate::models::{self, Collection, Entity, Field, Fqid, Model};

struct Change {
    scope: Option<String>,
    removed: Vec<Fqid>,
    added: Vec<Fqid>,
}

#[derive(Default)]
struct Collected {
    updates: BTreeMap<Fqid, Entity>,
    missing: BTreeMap<Collection, Vec<u64>>,
    foreign: Vec<Fqid>,
}

/// Compute the writes that keep back-references consistent when the
/// relation fields of `fqid` change from `old` to `new`.
///
/// `new` only needs the fields being written; a null value clears the field.
/// Creating passes `old = None`, deleting passes every relation field as null.
pub async fn relation_updates(
    view: &mut DatastoreView,
    model: &Model,
    fqid: Fqid,
    old: Option<&Entity>,
    new: &Entity,
) -> ActionResult<Vec<WriteOperation>> {
    let own_meeting = new
        .get("meeting_id")
        .and_then(Value::as_u64)
        .or_else(|| old.and_then(|o| o.get("meeting_id")).and_then(Value::as_u64))
        .or((fqid.collection == Collection::Meeting).then_some(fqid.id));

    let mut collected = Collected::default();

    for (name, value) in new {
        let Some(field) = model.field(name) else {
            continue;
        };
        if !field.is_relation() {
            continue;
        }
        let old_value = old.and_then(|o| o.get(name)).unwrap_or(&Value::Null);

        for change in diff(field, old_value, value)? {
            let scope = match (&change.scope, own_meeting) {
                (Some(scope), _) => Some(scope.clone()),
                (None, Some(meeting_id)) => Some(meeting_id.to_string()),
                (None, None) => None,
            };
            for target in &change.added {
                link(view, field, fqid, *target, scope.as_deref(), own_meeting, true, &mut collected)
                    .await?;
            }
            for target in &change.removed {
                link(view, field, fqid, *target, scope.as_deref(), own_meeting, false, &mut collected)
                    .await?;
            }
        }
    }

    if let Some((collection, ids)) = collected.missing.into_iter().next() {
        return Err(ActionError::action(format!(
            "The following {}s were not found: {:?}",
            collection, ids
        )));
    }
    if !collected.foreign.is_empty() {
        let names: Vec<String> = collected
            .foreign
            .iter()
            .map(|fqid| format!("'{}'", fqid))
            .collect();
        return Err(ActionError::action(format!(
            "The following models do not belong to meeting {}: [{}]",
            own_meeting.unwrap_or_default(),
            names.join(", ")
        )));
    }

    Ok(collected
        .updates
        .into_iter()
        .map(|(fqid, fields)| WriteOperation::Update { fqid, fields })
        .collect())
}

fn diff(field: &Field, old: &Value, new: &Value) -> ActionResult<Vec<Change>> {
    if !field.template {
        let before = targets(field, old)?;
        let after = targets(field, new)?;
        return Ok(vec![Change {
            scope: None,
            removed: subtract(&before, &after),
            added: subtract(&after, &before),
        }]);
    }

    let empty = Map::new();
    let before = old.as_object().unwrap_or(&empty);
    let after = new.as_object().unwrap_or(&empty);
    let mut scopes: Vec<&String> = before.keys().chain(after.keys()).collect();
    scopes.sort();
    scopes.dedup();

    let mut changes = Vec::with_capacity(scopes.len());
    for scope in scopes {
        let before = targets(field, before.get(scope).unwrap_or(&Value::Null))?;
        let after = targets(field, after.get(scope).unwrap_or(&Value::Null))?;
        changes.push(Change {
            scope: Some(scope.clone()),
            removed: subtract(&before, &after),
            added: subtract(&after, &before),
        });
    }
    Ok(changes)
}

fn targets(field: &Field, value: &Value) -> ActionResult<Vec<Fqid>> {
    let single_target = || {
        field
            .relation_targets()
            .first()
            .map(|target| target.collection)
            .ok_or_else(|| ActionError::internal(format!("{} has no relation target", field.name)))
    };
    let parse_fqid = |raw: &Value| -> ActionResult<Fqid> {
        raw.as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| ActionError::action(format!("{} is not a valid fqid", raw)))
    };
    let parse_id = |raw: &Value| -> ActionResult<u64> {
        raw.as_u64()
            .ok_or_else(|| ActionError::action(format!("{} is not a valid id", raw)))
    };

    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) if field.is_generic_relation() => items.iter().map(parse_fqid).collect(),
        Value::Array(items) => {
            let collection = single_target()?;
            items
                .iter()
                .map(|item| parse_id(item).map(|id| Fqid::new(collection, id)))
                .collect()
        }
        other if field.is_generic_relation() => Ok(vec![parse_fqid(other)?]),
        other => Ok(vec![Fqid::new(single_target()?, parse_id(other)?)]),
    }
}

fn subtract(left: &[Fqid], right: &[Fqid]) -> Vec<Fqid> {
    left.iter().filter(|f| !right.contains(f)).copied().collect()
}

#[allow(clippy::too_many_arguments)]
async fn link(
    view: &mut DatastoreView,
    field: &Field,
    own: Fqid,
    target: Fqid,
    scope: Option<&str>,
    own_meeting: Option<u64>,
    add: bool,
    collected: &mut Collected,
) -> ActionResult<()> {
    let relation = field.target_for(target.collection).ok_or_else(|| {
        ActionError::action(format!("{} is not a valid target of {}", target, field.name))
    })?;
    let back_field = models::model(target.collection)
        .field(relation.field)
        .ok_or_else(|| ActionError::internal(format!("missing back field {}", relation.field)))?;

    let current = match view.get(target, &[relation.field, "meeting_id"]).await {
        Ok(current) => current,
        Err(DatastoreError::NotFound(_)) => {
            if add {
                collected
                    .missing
                    .entry(target.collection)
                    .or_default()
                    .push(target.id);
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if add && field.equal_meeting {
        let target_meeting = if target.collection == Collection::Meeting {
            Some(target.id)
        } else {
            current.get("meeting_id").and_then(Value::as_u64)
        };
        if let (Some(own), Some(theirs)) = (own_meeting, target_meeting) {
            if own != theirs {
                collected.foreign.push(target);
                return Ok(());
            }
        }
    }

    let reference = if back_field.is_generic_relation() {
        Value::String(own.to_string())
    } else {
        Value::from(own.id)
    };

    let existing = collected
        .updates
        .get(&target)
        .and_then(|pending| pending.get(relation.field))
        .or_else(|| current.get(relation.field))
        .cloned()
        .unwrap_or(Value::Null);

    let updated = if back_field.template {
        let key = scope.ok_or_else(|| {
            ActionError::internal(format!(
                "{}/{} needs a meeting to update {}",
                own, field.name, relation.field
            ))
        })?;
        let mut scoped = existing.as_object().cloned().unwrap_or_default();
        let inner = scoped.get(key).cloned().unwrap_or(Value::Null);
        match modify(back_field, inner, reference, add) {
            Value::Null => {
                scoped.remove(key);
            }
            value => {
                scoped.insert(key.to_string(), value);
            }
        }
        Value::Object(scoped)
    } else {
        modify(back_field, existing, reference, add)
    };

    collected
        .updates
        .entry(target)
        .or_default()
        .insert(relation.field.to_string(), updated);
    Ok(())
}

fn modify(back_field: &Field, current: Value, reference: Value, add: bool) -> Value {
    if back_field.is_list_relation() {
        let mut list = match current {
            Value::Array(list) => list,
            _ => Vec::new(),
        };
        if add {
            if !list.contains(&reference) {
                list.push(reference);
            }
        } else {
            list.retain(|item| item != &reference);
        }
        Value::Array(list)
    } else if add {
        reference
    } else if current == reference {
        Value::Null
    } else {
        current
    }
}
