use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::datastore::error::DatastoreResult;
use crate::datastore::filter::Filter;
use crate::models::{Collection, Entity, Fqid};

/// Monotonic datastore version; every commit creates a new position
pub type Position = u64;

/// An entity together with the position of its last change
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned {
    pub fqid: Fqid,
    pub data: Entity,
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterResult {
    pub entities: Vec<Versioned>,
    /// Datastore position at the time of the read, used to lock the collection
    pub position: Position,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WriteOperation {
    Create { fqid: Fqid, fields: Entity },
    /// Fields set to null are removed from the entity
    Update { fqid: Fqid, fields: Entity },
    Delete { fqid: Fqid },
}

impl WriteOperation {
    pub fn fqid(&self) -> Fqid {
        match self {
            WriteOperation::Create { fqid, .. }
            | WriteOperation::Update { fqid, .. }
            | WriteOperation::Delete { fqid } => *fqid,
        }
    }
}

/// One atomic commit: operations plus the optimistic locks gathered while reading
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WriteRequest {
    pub user_id: u64,
    pub information: BTreeMap<String, Value>,
    pub locked_entities: BTreeMap<Fqid, Position>,
    pub locked_collections: BTreeMap<Collection, Position>,
    pub operations: Vec<WriteOperation>,
}

/// Client-side contract of the datastore.
///
/// `fields` restricts the returned data, an empty slice returns every field.
/// The `id` field is always part of the result.
#[async_trait]
pub trait Datastore: Send + Sync {
    async fn get(&self, fqid: Fqid, fields: &[&str]) -> DatastoreResult<Versioned>;

    /// Missing entities are left out of the result
    async fn get_many(&self, fqids: &[Fqid], fields: &[&str]) -> DatastoreResult<Vec<Versioned>>;

    async fn filter(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: &[&str],
    ) -> DatastoreResult<FilterResult>;

    async fn exists(&self, collection: Collection, filter: &Filter) -> DatastoreResult<bool> {
        let result = self.filter(collection, filter, &["id"]).await?;
        Ok(!result.entities.is_empty())
    }

    async fn max(
        &self,
        collection: Collection,
        filter: &Filter,
        field: &str,
    ) -> DatastoreResult<Option<i64>> {
        let result = self.filter(collection, filter, &[field]).await?;
        Ok(result
            .entities
            .iter()
            .filter_map(|entity| entity.data.get(field).and_then(Value::as_i64))
            .max())
    }

    async fn reserve_ids(&self, collection: Collection, amount: usize) -> DatastoreResult<Vec<u64>>;

    /// Commit atomically; fails with `Conflict` if locked data changed meanwhile
    async fn write(&self, request: WriteRequest) -> DatastoreResult<Position>;
}

/// Restrict `data` to `fields` (plus `id`), all fields if `fields` is empty
pub fn project(data: &Entity, fields: &[&str]) -> Entity {
    if fields.is_empty() {
        return data.clone();
    }
    data.iter()
        .filter(|(key, _)| key.as_str() == "id" || fields.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
