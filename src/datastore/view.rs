use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::datastore::error::{DatastoreError, DatastoreResult};
use crate::datastore::filter::Filter;
use crate::datastore::interface::{project, Datastore, Position, WriteOperation, WriteRequest};
use crate::models::{Collection, Entity, Fqid};

#[derive(Debug, Clone)]
enum Change {
    Created(Entity),
    Updated(Entity),
    Deleted,
}

/// Request-scoped view of the datastore.
///
/// Reads see the writes queued earlier in the same request, and every read
/// records the position it observed so the final commit can be locked.
pub struct DatastoreView {
    datastore: Arc<dyn Datastore>,
    changes: HashMap<Fqid, Change>,
    locked_entities: BTreeMap<Fqid, Position>,
    locked_collections: BTreeMap<Collection, Position>,
}

impl DatastoreView {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        Self {
            datastore,
            changes: HashMap::new(),
            locked_entities: BTreeMap::new(),
            locked_collections: BTreeMap::new(),
        }
    }

    fn lock_entity(&mut self, fqid: Fqid, position: Position) {
        // keep the earliest observed position
        self.locked_entities
            .entry(fqid)
            .and_modify(|p| *p = (*p).min(position))
            .or_insert(position);
    }

    fn lock_collection(&mut self, collection: Collection, position: Position) {
        self.locked_collections
            .entry(collection)
            .and_modify(|p| *p = (*p).min(position))
            .or_insert(position);
    }

    pub async fn get(&mut self, fqid: Fqid, fields: &[&str]) -> DatastoreResult<Entity> {
        match self.changes.get(&fqid) {
            Some(Change::Deleted) => return Err(DatastoreError::NotFound(fqid)),
            Some(Change::Created(data)) => return Ok(project(data, fields)),
            _ => {}
        }

        let versioned = self.datastore.get(fqid, fields).await?;
        self.lock_entity(fqid, versioned.position);
        let mut data = versioned.data;
        if let Some(Change::Updated(update)) = self.changes.get(&fqid) {
            merge_update(&mut data, update, fields);
        }
        Ok(data)
    }

    /// Missing entities are skipped
    pub async fn get_many(&mut self, fqids: &[Fqid], fields: &[&str]) -> DatastoreResult<Vec<Entity>> {
        let remote: Vec<Fqid> = fqids
            .iter()
            .copied()
            .filter(|fqid| {
                !matches!(
                    self.changes.get(fqid),
                    Some(Change::Created(_)) | Some(Change::Deleted)
                )
            })
            .collect();

        let fetched = self.datastore.get_many(&remote, fields).await?;
        let mut loaded: HashMap<Fqid, Entity> = HashMap::new();
        for versioned in fetched {
            self.lock_entity(versioned.fqid, versioned.position);
            loaded.insert(versioned.fqid, versioned.data);
        }

        let mut result = Vec::with_capacity(fqids.len());
        for fqid in fqids {
            match self.changes.get(fqid) {
                Some(Change::Deleted) => {}
                Some(Change::Created(data)) => result.push(project(data, fields)),
                Some(Change::Updated(update)) => {
                    if let Some(mut data) = loaded.remove(fqid) {
                        merge_update(&mut data, update, fields);
                        result.push(data);
                    }
                }
                None => {
                    if let Some(data) = loaded.remove(fqid) {
                        result.push(data);
                    }
                }
            }
        }
        Ok(result)
    }

    pub async fn exists(&mut self, fqid: Fqid) -> DatastoreResult<bool> {
        match self.get(fqid, &["id"]).await {
            Ok(_) => Ok(true),
            Err(DatastoreError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Filter with pending changes applied; results are ordered by id
    pub async fn filter(
        &mut self,
        collection: Collection,
        filter: &Filter,
        fields: &[&str],
    ) -> DatastoreResult<Vec<Entity>> {
        let result = self.datastore.filter(collection, filter, &[]).await?;
        self.lock_collection(collection, result.position);

        let mut matched: BTreeMap<u64, Entity> = BTreeMap::new();
        for versioned in result.entities {
            if self.changes.contains_key(&versioned.fqid) {
                continue;
            }
            self.lock_entity(versioned.fqid, versioned.position);
            matched.insert(versioned.fqid.id, project(&versioned.data, fields));
        }

        // entities touched in this request are evaluated on their merged state
        let touched: Vec<Fqid> = self
            .changes
            .keys()
            .copied()
            .filter(|fqid| fqid.collection == collection)
            .collect();
        for fqid in touched {
            match self.get(fqid, &[]).await {
                Ok(data) if filter.matches(&data) => {
                    matched.insert(fqid.id, project(&data, fields));
                }
                Ok(_) | Err(DatastoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        Ok(matched.into_values().collect())
    }

    pub async fn exists_where(&mut self, collection: Collection, filter: &Filter) -> DatastoreResult<bool> {
        Ok(!self.filter(collection, filter, &["id"]).await?.is_empty())
    }

    pub async fn max(
        &mut self,
        collection: Collection,
        filter: &Filter,
        field: &str,
    ) -> DatastoreResult<Option<i64>> {
        let entities = self.filter(collection, filter, &[field]).await?;
        Ok(entities
            .iter()
            .filter_map(|entity| entity.get(field).and_then(Value::as_i64))
            .max())
    }

    pub async fn reserve_id(&self, collection: Collection) -> DatastoreResult<u64> {
        self.datastore
            .reserve_ids(collection, 1)
            .await?
            .first()
            .copied()
            .ok_or_else(|| DatastoreError::InvalidResponse(format!("no id reserved for {}", collection)))
    }

    /// Make a queued operation visible to later reads
    pub fn apply(&mut self, operation: &WriteOperation) {
        match operation {
            WriteOperation::Create { fqid, fields } => {
                let mut data = fields.clone();
                data.insert("id".to_string(), Value::from(fqid.id));
                data.retain(|_, value| !value.is_null());
                self.changes.insert(*fqid, Change::Created(data));
            }
            WriteOperation::Update { fqid, fields } => match self.changes.get_mut(fqid) {
                Some(Change::Created(data)) => merge_update(data, fields, &[]),
                Some(Change::Updated(pending)) => {
                    pending.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                }
                Some(Change::Deleted) => {}
                None => {
                    self.changes.insert(*fqid, Change::Updated(fields.clone()));
                }
            },
            WriteOperation::Delete { fqid } => {
                self.changes.insert(*fqid, Change::Deleted);
            }
        }
    }

    pub fn into_write_request(self, user_id: u64, operations: Vec<WriteOperation>) -> WriteRequest {
        WriteRequest {
            user_id,
            information: BTreeMap::new(),
            locked_entities: self.locked_entities,
            locked_collections: self.locked_collections,
            operations,
        }
    }
}

fn merge_update(data: &mut Entity, update: &Entity, fields: &[&str]) {
    for (key, value) in update {
        if key == "id" || (!fields.is_empty() && !fields.contains(&key.as_str())) {
            continue;
        }
        if value.is_null() {
            data.remove(key);
        } else {
            data.insert(key.clone(), value.clone());
        }
    }
}
