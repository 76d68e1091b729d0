use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::time::Duration;
use url::Url;

use crate::datastore::error::{DatastoreError, DatastoreResult};
use crate::datastore::filter::Filter;
use crate::datastore::interface::{
    Datastore, FilterResult, Position, Versioned, WriteOperation, WriteRequest,
};
use crate::models::{Collection, Fqid};

/// Adapter for the external datastore reader and writer services
#[derive(Debug, Clone)]
pub struct HttpDatastore {
    client: reqwest::Client,
    reader_url: Url,
    writer_url: Url,
}

impl HttpDatastore {
    pub fn new(reader_url: Url, writer_url: Url, timeout: Duration) -> DatastoreResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DatastoreError::Connection {
                url: reader_url.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            reader_url,
            writer_url,
        })
    }

    async fn post_reader(&self, route: &str, body: Value) -> DatastoreResult<Value> {
        self.post(&self.reader_url, route, body).await
    }

    async fn post_writer(&self, route: &str, body: Value) -> DatastoreResult<Value> {
        self.post(&self.writer_url, route, body).await
    }

    async fn post(&self, base: &Url, route: &str, body: Value) -> DatastoreResult<Value> {
        let url = endpoint(base, route)?;
        tracing::debug!("Datastore request {} {}", url, body);

        let response = self
            .client
            .post(url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| DatastoreError::Connection {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| DatastoreError::Connection {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let payload: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)
                .map_err(|e| DatastoreError::InvalidResponse(format!("{}: {}", url, e)))?
        };

        if status.is_success() {
            Ok(payload)
        } else {
            Err(map_error_response(status.as_u16(), &payload))
        }
    }
}

fn endpoint(base: &Url, route: &str) -> DatastoreResult<Url> {
    let joined = format!("{}/{}", base.as_str().trim_end_matches('/'), route);
    Url::parse(&joined).map_err(|e| DatastoreError::InvalidResponse(format!("{}: {}", joined, e)))
}

fn map_error_response(status: u16, payload: &Value) -> DatastoreError {
    let error = &payload["error"];
    match error["type"].as_str() {
        Some("ModelDoesNotExist") => match error["fqid"].as_str().and_then(|s| s.parse().ok()) {
            Some(fqid) => DatastoreError::NotFound(fqid),
            None => DatastoreError::InvalidResponse(payload.to_string()),
        },
        Some("ModelLocked") | Some("ModelLockedException") => {
            DatastoreError::Conflict(format!("locked keys {}", error["keys"]))
        }
        Some("InvalidRequest") | Some("InvalidFormat") => {
            DatastoreError::InvalidWrite(error["msg"].as_str().unwrap_or_default().to_string())
        }
        _ => DatastoreError::InvalidResponse(format!("status {}: {}", status, payload)),
    }
}

fn mapped_fields(fields: &[&str]) -> Value {
    if fields.is_empty() {
        Value::Null
    } else {
        let mut all: Vec<&str> = fields.to_vec();
        if !all.contains(&"id") {
            all.push("id");
        }
        json!(all)
    }
}

/// Split a reader entity into data and its `meta_position`
fn into_versioned(fqid: Fqid, value: Value) -> DatastoreResult<Versioned> {
    let Value::Object(mut data) = value else {
        return Err(DatastoreError::InvalidResponse(format!(
            "{} is not an object",
            fqid
        )));
    };
    let position = data
        .remove("meta_position")
        .and_then(|p| p.as_u64())
        .unwrap_or(0);
    data.retain(|key, _| !key.starts_with("meta_"));
    data.entry("id").or_insert_with(|| Value::from(fqid.id));
    Ok(Versioned {
        fqid,
        data,
        position,
    })
}

fn entities_of(collection: Collection, value: Value) -> DatastoreResult<Vec<Versioned>> {
    let Value::Object(by_id) = value else {
        return Ok(Vec::new());
    };
    let mut entities = Vec::with_capacity(by_id.len());
    for (id, data) in by_id {
        let id: u64 = id
            .parse()
            .map_err(|_| DatastoreError::InvalidResponse(format!("invalid id {}", id)))?;
        entities.push(into_versioned(Fqid::new(collection, id), data)?);
    }
    entities.sort_by_key(|entity| entity.fqid.id);
    Ok(entities)
}

fn write_body(request: &WriteRequest) -> Value {
    let mut locked_fields = Map::new();
    for (fqid, position) in &request.locked_entities {
        locked_fields.insert(fqid.to_string(), json!(position));
    }
    for (collection, position) in &request.locked_collections {
        locked_fields.insert(collection.to_string(), json!(position));
    }

    let events: Vec<Value> = request
        .operations
        .iter()
        .map(|operation| match operation {
            WriteOperation::Create { fqid, fields } => {
                json!({ "type": "create", "fqid": fqid, "fields": fields })
            }
            WriteOperation::Update { fqid, fields } => {
                json!({ "type": "update", "fqid": fqid, "fields": fields })
            }
            WriteOperation::Delete { fqid } => json!({ "type": "delete", "fqid": fqid }),
        })
        .collect();

    json!({
        "user_id": request.user_id,
        "information": request.information,
        "locked_fields": locked_fields,
        "events": events,
    })
}

#[async_trait]
impl Datastore for HttpDatastore {
    async fn get(&self, fqid: Fqid, fields: &[&str]) -> DatastoreResult<Versioned> {
        let response = self
            .post_reader(
                "get",
                json!({ "fqid": fqid, "mapped_fields": mapped_fields(fields) }),
            )
            .await?;
        into_versioned(fqid, response)
    }

    async fn get_many(&self, fqids: &[Fqid], fields: &[&str]) -> DatastoreResult<Vec<Versioned>> {
        if fqids.is_empty() {
            return Ok(Vec::new());
        }
        let requests: Vec<String> = fqids.iter().map(Fqid::to_string).collect();
        let mut response = self
            .post_reader(
                "get_many",
                json!({ "requests": requests, "mapped_fields": mapped_fields(fields) }),
            )
            .await?;

        let mut result = Vec::with_capacity(fqids.len());
        for fqid in fqids {
            let entity = response
                .get_mut(fqid.collection.as_str())
                .and_then(|by_id| by_id.get_mut(fqid.id.to_string()))
                .map(Value::take)
                .unwrap_or_default();
            if !entity.is_null() {
                result.push(into_versioned(*fqid, entity)?);
            }
        }
        Ok(result)
    }

    async fn filter(
        &self,
        collection: Collection,
        filter: &Filter,
        fields: &[&str],
    ) -> DatastoreResult<FilterResult> {
        let mut response = self
            .post_reader(
                "filter",
                json!({
                    "collection": collection,
                    "filter": filter,
                    "mapped_fields": mapped_fields(fields),
                }),
            )
            .await?;
        let position = response["position"].as_u64().unwrap_or(0);
        Ok(FilterResult {
            entities: entities_of(
                collection,
                response.get_mut("data").map(Value::take).unwrap_or_default(),
            )?,
            position,
        })
    }

    async fn exists(&self, collection: Collection, filter: &Filter) -> DatastoreResult<bool> {
        let response = self
            .post_reader("exists", json!({ "collection": collection, "filter": filter }))
            .await?;
        Ok(response["exists"].as_bool().unwrap_or(false))
    }

    async fn max(
        &self,
        collection: Collection,
        filter: &Filter,
        field: &str,
    ) -> DatastoreResult<Option<i64>> {
        let response = self
            .post_reader(
                "max",
                json!({ "collection": collection, "filter": filter, "field": field }),
            )
            .await?;
        Ok(response["max"].as_i64())
    }

    async fn reserve_ids(&self, collection: Collection, amount: usize) -> DatastoreResult<Vec<u64>> {
        let response = self
            .post_writer(
                "reserve_ids",
                json!({ "collection": collection, "amount": amount }),
            )
            .await?;
        let ids: Vec<u64> = response["ids"]
            .as_array()
            .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default();
        if ids.len() != amount {
            return Err(DatastoreError::InvalidResponse(format!(
                "requested {} ids for {}, got {}",
                amount,
                collection,
                ids.len()
            )));
        }
        Ok(ids)
    }

    async fn write(&self, request: WriteRequest) -> DatastoreResult<Position> {
        let response = self.post_writer("write", write_body(&request)).await?;
        Ok(response["position"].as_u64().unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = Url::parse("http://localhost:9010/internal/datastore/reader").unwrap();
        assert_eq!(
            endpoint(&base, "get").unwrap().as_str(),
            "http://localhost:9010/internal/datastore/reader/get"
        );
    }

    #[test]
    fn test_error_mapping() {
        let missing = json!({ "error": { "type": "ModelDoesNotExist", "fqid": "poll/3" } });
        assert_eq!(
            map_error_response(400, &missing),
            DatastoreError::NotFound(Fqid::new(Collection::Poll, 3))
        );

        let locked = json!({ "error": { "type": "ModelLockedException", "keys": ["poll/3"] } });
        assert!(matches!(map_error_response(400, &locked), DatastoreError::Conflict(_)));
    }

    #[test]
    fn test_reader_entity_drops_meta_fields() {
        let fqid = Fqid::new(Collection::User, 4);
        let versioned =
            into_versioned(fqid, json!({ "username": "a", "meta_position": 17, "meta_deleted": false }))
                .unwrap();
        assert_eq!(versioned.position, 17);
        assert_eq!(versioned.data, json!({ "username": "a", "id": 4 }).as_object().cloned().unwrap());
    }

    #[test]
    fn test_write_body_format() {
        let fqid = Fqid::new(Collection::Poll, 1);
        let mut locked_entities = BTreeMap::new();
        locked_entities.insert(fqid, 5);
        let mut locked_collections = BTreeMap::new();
        locked_collections.insert(Collection::User, 7);
        let request = WriteRequest {
            user_id: 1,
            locked_entities,
            locked_collections,
            operations: vec![WriteOperation::Delete { fqid }],
            ..Default::default()
        };

        let body = write_body(&request);
        assert_eq!(body["locked_fields"], json!({ "poll/1": 5, "user": 7 }));
        assert_eq!(body["events"], json!([{ "type": "delete", "fqid": "poll/1" }]));
    }
}
