use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::RwLock;

use crate::datastore::error::{DatastoreError, DatastoreResult};
use crate::datastore::filter::Filter;
use crate::datastore::interface::{
    project, Datastore, FilterResult, Position, Versioned, WriteOperation, WriteRequest,
};
use crate::models::{Collection, Entity, Fqid};

#[derive(Debug, Clone)]
struct StoredEntity {
    data: Entity,
    position: Position,
}

#[derive(Debug, Default)]
struct MemoryState {
    entities: HashMap<Fqid, StoredEntity>,
    position: Position,
    collection_positions: HashMap<Collection, Position>,
    // deleted entities keep their last position so stale locks still conflict
    tombstones: HashMap<Fqid, Position>,
    next_ids: HashMap<Collection, u64>,
}

impl MemoryState {
    fn entity_position(&self, fqid: &Fqid) -> Position {
        self.entities
            .get(fqid)
            .map(|stored| stored.position)
            .or_else(|| self.tombstones.get(fqid).copied())
            .unwrap_or(0)
    }

    fn bump_next_id(&mut self, fqid: Fqid) {
        let next = self.next_ids.entry(fqid.collection).or_insert(1);
        if *next <= fqid.id {
            *next = fqid.id + 1;
        }
    }
}

/// In-process datastore backend with the full locking semantics of the
/// external service. Used for development and tests.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    state: RwLock<MemoryState>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a datastore from a `{"collection/id": {fields}}` object
    pub async fn from_models(models: Value) -> DatastoreResult<Self> {
        let datastore = Self::new();
        datastore.set_models(models).await?;
        Ok(datastore)
    }

    /// Load initial data from a JSON file in the same format as `from_models`
    pub async fn from_file(path: impl AsRef<Path>) -> DatastoreResult<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            DatastoreError::InvalidData(format!("cannot read {}: {}", path.display(), e))
        })?;
        let models: Value = serde_json::from_str(&raw).map_err(|e| {
            DatastoreError::InvalidData(format!("{} is not valid JSON: {}", path.display(), e))
        })?;
        Self::from_models(models).await
    }

    /// Insert or replace entities directly, bypassing the write checks.
    /// All entities share one new position.
    pub async fn set_models(&self, models: Value) -> DatastoreResult<()> {
        let Value::Object(models) = models else {
            return Err(DatastoreError::InvalidData(
                "models must be an object keyed by fqid".to_string(),
            ));
        };

        let mut state = self.state.write().await;
        state.position += 1;
        let position = state.position;

        for (key, value) in models {
            let fqid: Fqid = key.parse()?;
            let Value::Object(mut data) = value else {
                return Err(DatastoreError::InvalidData(format!("{} must be an object", key)));
            };
            data.insert("id".to_string(), Value::from(fqid.id));
            data.retain(|_, value| !value.is_null());

            state.entities.insert(fqid, StoredEntity { data, position });
            state.tombstones.remove(&fqid);
            state.collection_positions.insert(fqid.collection, position);
            state.bump_next_id(fqid);
        }

        tracing::debug!("Memory datastore seeded at position {}", position);
        Ok(())
    }

    pub async fn position(&self) -> Position {
        self.state.read().await.position
    }
}

#[async_trait]
impl Datastore for MemoryDatastore {
    async fn get(&self, fqid: Fqid, fields: &[&str]) -> DatastoreResult<Versioned> {
        let state = self.state.read().await;
        let stored = state
            .entities
            .get(&fqid)
            .ok_or(DatastoreError::NotFound(fqid))?;
        Ok(Versioned {
            fqid,
            data: project(&stored.data, fields),
            position: stored.position,
        })
    }

    async fn get_many(&self, fqids: &[Fqid], fields: &[&str]) -> DatastoreResult<Vec<Versioned>> {
        let state = self.state.read().await;
        Ok(fqids
            .iter()
            .filter_map(|fqid| {
                state.entities.get(fqid).map(|stored| Versioned {
                    fqid: *fqid,
                    data: project(&stored.data, fields),
                    position: stored.position,
                })
            })
            .collect())
    }

    async fn filter(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: &[&str],
    ) -> DatastoreResult<FilterResult> {
        let state = self.state.read().await;
        let mut entities: Vec<Versioned> = state
            .entities
            .iter()
            .filter(|(fqid, stored)| fqid.collection == collection && filter.matches(&stored.data))
            .map(|(fqid, stored)| Versioned {
                fqid: *fqid,
                data: project(&stored.data, fields),
                position: stored.position,
            })
            .collect();
        entities.sort_by_key(|entity| entity.fqid.id);

        Ok(FilterResult {
            entities,
            position: state.position,
        })
    }

    async fn reserve_ids(&self, collection: Collection, amount: usize) -> DatastoreResult<Vec<u64>> {
        let mut state = self.state.write().await;
        let next = state.next_ids.entry(collection).or_insert(1);
        let start = *next;
        *next += amount as u64;
        Ok((start..start + amount as u64).collect())
    }

    async fn write(&self, request: WriteRequest) -> DatastoreResult<Position> {
        let mut state = self.state.write().await;

        for (fqid, locked) in &request.locked_entities {
            let current = state.entity_position(fqid);
            if current > *locked {
                return Err(DatastoreError::Conflict(format!(
                    "Model '{}' changed at position {} after it was read at {}",
                    fqid, current, locked
                )));
            }
        }
        for (collection, locked) in &request.locked_collections {
            let current = state.collection_positions.get(collection).copied().unwrap_or(0);
            if current > *locked {
                return Err(DatastoreError::Conflict(format!(
                    "Collection '{}' changed at position {} after it was read at {}",
                    collection, current, locked
                )));
            }
        }

        // Stage every change first so a failing operation leaves the store untouched
        let mut staged: HashMap<Fqid, Option<Entity>> = HashMap::new();
        for operation in &request.operations {
            let fqid = operation.fqid();
            let current = match staged.get(&fqid) {
                Some(entry) => entry.clone(),
                None => state.entities.get(&fqid).map(|stored| stored.data.clone()),
            };

            let next = match (operation, current) {
                (WriteOperation::Create { fields, .. }, None) => {
                    let mut data = fields.clone();
                    data.insert("id".to_string(), Value::from(fqid.id));
                    data.retain(|_, value| !value.is_null());
                    Some(data)
                }
                (WriteOperation::Create { .. }, Some(_)) => {
                    return Err(DatastoreError::InvalidWrite(format!(
                        "Model '{}' already exists.",
                        fqid
                    )));
                }
                (WriteOperation::Update { fields, .. }, Some(mut data)) => {
                    for (key, value) in fields {
                        if key == "id" {
                            continue;
                        }
                        if value.is_null() {
                            data.remove(key);
                        } else {
                            data.insert(key.clone(), value.clone());
                        }
                    }
                    Some(data)
                }
                (WriteOperation::Delete { .. }, Some(_)) => None,
                (WriteOperation::Update { .. } | WriteOperation::Delete { .. }, None) => {
                    return Err(DatastoreError::NotFound(fqid));
                }
            };
            staged.insert(fqid, next);
        }

        state.position += 1;
        let position = state.position;
        for (fqid, data) in staged {
            state.collection_positions.insert(fqid.collection, position);
            match data {
                Some(data) => {
                    state.entities.insert(fqid, StoredEntity { data, position });
                    state.tombstones.remove(&fqid);
                    state.bump_next_id(fqid);
                }
                None => {
                    state.entities.remove(&fqid);
                    state.tombstones.insert(fqid, position);
                }
            }
        }

        tracing::debug!(
            "Memory datastore committed {} operations at position {}",
            request.operations.len(),
            position
        );
        Ok(position)
    }
}
