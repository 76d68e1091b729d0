use futures::future::BoxFuture;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::action::base::{Action, ActionKind, Instance};
use crate::action::error::{ActionError, ActionResult};
use crate::action::registry::ActionRegistry;
use crate::action::relations::relation_updates;
use crate::datastore::{Datastore, DatastoreView, WriteOperation, WriteRequest};
use crate::models::{self, Collection, Entity, Fqid, Model};

/// Nesting limit for actions started by other actions
const MAX_ACTION_DEPTH: usize = 5;

/// State of one action request: the datastore view and the queued writes
pub struct ActionContext {
    user_id: u64,
    view: DatastoreView,
    registry: Arc<ActionRegistry>,
    operations: Vec<WriteOperation>,
    depth: usize,
}

impl ActionContext {
    pub fn new(user_id: u64, datastore: Arc<dyn Datastore>, registry: Arc<ActionRegistry>) -> Self {
        Self {
            user_id,
            view: DatastoreView::new(datastore),
            registry,
            operations: Vec::new(),
            depth: 0,
        }
    }

    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn datastore(&mut self) -> &mut DatastoreView {
        &mut self.view
    }

    pub fn operations(&self) -> &[WriteOperation] {
        &self.operations
    }

    /// Queue a write and make it visible to later reads
    pub fn push(&mut self, operation: WriteOperation) {
        self.view.apply(&operation);
        self.operations.push(operation);
    }

    /// Queue a plain field update without back-reference handling
    pub fn queue_update(&mut self, fqid: Fqid, fields: Entity) {
        self.push(WriteOperation::Update { fqid, fields });
    }

    pub fn into_write_request(self) -> WriteRequest {
        self.view.into_write_request(self.user_id, self.operations)
    }

    /// Run `action` on already validated instances.
    ///
    /// Boxed because handlers can start other actions from inside.
    pub fn execute_action(
        &mut self,
        action: Arc<dyn Action>,
        instances: Vec<Instance>,
    ) -> BoxFuture<'_, ActionResult<Vec<Option<Value>>>> {
        Box::pin(async move {
            tracing::debug!(
                "Running {} on {} instance(s)",
                action.name(),
                instances.len()
            );
            let instances = action.get_updated_instances(self, instances).await?;
            let collection = action.collection();

            let mut results = Vec::with_capacity(instances.len());
            for instance in instances {
                let (written, result) = match action.kind() {
                    ActionKind::Create => {
                        let fqid = self.create_instance(collection, instance.clone()).await?;
                        (Some(fqid), Some(json!({ "id": fqid.id })))
                    }
                    ActionKind::Update => {
                        (Some(self.update_model(collection, instance.clone()).await?), None)
                    }
                    ActionKind::Delete => {
                        (Some(self.delete_model(collection, &instance).await?), None)
                    }
                    ActionKind::Custom => (None, None),
                };
                if let Some(fqid) = written {
                    action.after_write(self, fqid, &instance).await?;
                }
                results.push(result);
            }
            Ok(results)
        })
    }

    /// Run another registered action (internal ones included) within this
    /// request. The payload is validated, permissions are not checked.
    pub async fn execute_other_action(
        &mut self,
        name: &str,
        data: Vec<Value>,
    ) -> ActionResult<Vec<Option<Value>>> {
        if self.depth >= MAX_ACTION_DEPTH {
            return Err(ActionError::internal(format!(
                "Action {} exceeds the nesting limit of {}",
                name, MAX_ACTION_DEPTH
            )));
        }

        let registry = Arc::clone(&self.registry);
        let registered = registry
            .get(name)
            .ok_or_else(|| ActionError::internal(format!("Action {} is not registered", name)))?;
        let mut instances = Vec::with_capacity(data.len());
        for value in data {
            registered.validator.validate(&value)?;
            instances.push(into_instance(value)?);
        }
        let action = Arc::clone(&registered.action);

        self.depth += 1;
        let result = self.execute_action(action, instances).await;
        self.depth -= 1;
        result
    }

    /// Apply defaults, reserve an id and queue the create with its back-references
    pub async fn create_instance(
        &mut self,
        collection: Collection,
        mut instance: Instance,
    ) -> ActionResult<Fqid> {
        let model = models::model(collection);
        for field in model.fields() {
            if let Some(default) = &field.default {
                if !instance.contains_key(field.name) {
                    instance.insert(field.name.to_string(), default.clone());
                }
            }
        }
        instance.remove("id");

        let mut fields = sanitize(model, instance)?;
        fields.retain(|_, value| !value.is_null());

        let id = self.view.reserve_id(collection).await?;
        let fqid = Fqid::new(collection, id);
        fields.insert("id".to_string(), Value::from(id));

        let back_references = relation_updates(&mut self.view, model, fqid, None, &fields).await?;
        self.push(WriteOperation::Create { fqid, fields });
        for operation in back_references {
            self.push(operation);
        }
        Ok(fqid)
    }

    /// Queue an update; template fields are merged per meeting
    pub async fn update_model(&mut self, collection: Collection, instance: Instance) -> ActionResult<Fqid> {
        let model = models::model(collection);
        let fqid = Fqid::new(collection, instance_id(&instance)?);

        let mut fields = sanitize(model, instance)?;
        fields.remove("id");

        let mut read: Vec<String> = fields
            .keys()
            .filter(|name| {
                model
                    .field(name)
                    .map(|field| field.is_relation() || field.template)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();
        read.push("meeting_id".to_string());
        let read: Vec<&str> = read.iter().map(String::as_str).collect();
        let old = self.view.get(fqid, &read).await?;

        for (name, value) in fields.iter_mut() {
            let is_template = model.field(name).map(|f| f.template).unwrap_or(false);
            if let (true, Value::Object(patch)) = (is_template, &*value) {
                let mut merged = old
                    .get(name)
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                for (scope, inner) in patch {
                    if inner.is_null() {
                        merged.remove(scope);
                    } else {
                        merged.insert(scope.clone(), inner.clone());
                    }
                }
                *value = Value::Object(merged);
            }
        }

        if fields.is_empty() {
            return Ok(fqid);
        }

        let back_references = relation_updates(&mut self.view, model, fqid, Some(&old), &fields).await?;
        self.push(WriteOperation::Update { fqid, fields });
        for operation in back_references {
            self.push(operation);
        }
        Ok(fqid)
    }

    /// Queue a delete and clear every back-reference to the entity
    pub async fn delete_model(&mut self, collection: Collection, instance: &Instance) -> ActionResult<Fqid> {
        let model = models::model(collection);
        let fqid = Fqid::new(collection, instance_id(instance)?);

        let mut read: Vec<&str> = model.relation_fields().map(|field| field.name).collect();
        read.push("meeting_id");
        let old = self.view.get(fqid, &read).await?;

        let cleared: Entity = model
            .relation_fields()
            .map(|field| (field.name.to_string(), Value::Null))
            .collect();
        let back_references = relation_updates(&mut self.view, model, fqid, Some(&old), &cleared).await?;

        self.push(WriteOperation::Delete { fqid });
        for operation in back_references {
            self.push(operation);
        }
        Ok(fqid)
    }
}

fn sanitize(model: &Model, instance: Instance) -> ActionResult<Entity> {
    let mut fields = Entity::new();
    for (name, value) in instance {
        if name == "id" {
            fields.insert(name, value);
            continue;
        }
        let field = model.field(&name).ok_or_else(|| {
            ActionError::internal(format!(
                "Field {} does not exist in collection {}",
                name, model.collection
            ))
        })?;
        let value = field.validate(value)?;
        fields.insert(name, value);
    }
    Ok(fields)
}

pub fn instance_id(instance: &Instance) -> ActionResult<u64> {
    crate::action::base::id_field(instance, "id")
}

pub fn into_instance(value: Value) -> ActionResult<Instance> {
    match value {
        Value::Object(instance) => Ok(instance),
        other => Err(ActionError::Validation(format!("data must be object, got {}", other))),
    }
}
