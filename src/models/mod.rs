pub mod catalog;
pub mod fields;
pub mod fqid;
pub mod html;
pub mod schema;

pub use catalog::{model, verify_relations, Model};
pub use fields::{Field, FieldError, FieldKind, RelationTarget};
pub use fqid::{Collection, Fqid, FqidError};

/// An entity as stored in the datastore: field name to JSON value
pub type Entity = serde_json::Map<String, serde_json::Value>;
