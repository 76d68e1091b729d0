use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use std::str::FromStr;
use thiserror::Error;

use crate::models::fqid::{Collection, Fqid, FqidError};
use crate::models::html::{validate_html, ALLOWED_HTML_TAGS_PERMISSIVE, ALLOWED_HTML_TAGS_STRICT};
use crate::models::schema;

/// The other end of a relation field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationTarget {
    pub collection: Collection,
    pub field: &'static str,
}

impl RelationTarget {
    pub const fn new(collection: Collection, field: &'static str) -> Self {
        Self { collection, field }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Integer,
    Boolean,
    Text,
    Char,
    Json,
    HtmlStrict,
    HtmlPermissive,
    Float,
    Decimal,
    Timestamp,
    Color,
    CharArray,
    NumberArray,
    Relation(RelationTarget),
    RelationList(RelationTarget),
    GenericRelation(Vec<RelationTarget>),
    GenericRelationList(Vec<RelationTarget>),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FieldError {
    #[error("Field {field}: {value} is not a valid decimal.")]
    InvalidDecimal { field: String, value: String },

    #[error("Field {field}: {source}")]
    InvalidFqid { field: String, source: FqidError },

    #[error("Field {field}: {collection} is not a valid target of this relation.")]
    InvalidTarget { field: String, collection: Collection },

    #[error("Field {field} must be a mapping from meeting ids to values.")]
    NotAMapping { field: String },
}

/// Definition of one field of a collection
#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub kind: FieldKind,
    pub required: bool,
    pub template: bool,
    pub equal_meeting: bool,
    pub default: Option<Value>,
    pub constraints: Map<String, Value>,
}

impl Field {
    pub fn new(name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            kind,
            required: false,
            template: false,
            equal_meeting: false,
            default: None,
            constraints: Map::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Scope the field per meeting; values are stored as `{"<meeting_id>": value}`
    pub fn template(mut self) -> Self {
        self.template = true;
        self
    }

    /// Relation targets must live in the same meeting as the owning entity
    pub fn equal_meeting(mut self) -> Self {
        self.equal_meeting = true;
        self
    }

    pub fn default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn constraint(mut self, keyword: &str, value: Value) -> Self {
        self.constraints.insert(keyword.to_string(), value);
        self
    }

    pub fn is_relation(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::Relation(_)
                | FieldKind::RelationList(_)
                | FieldKind::GenericRelation(_)
                | FieldKind::GenericRelationList(_)
        )
    }

    pub fn is_list_relation(&self) -> bool {
        matches!(self.kind, FieldKind::RelationList(_) | FieldKind::GenericRelationList(_))
    }

    pub fn is_generic_relation(&self) -> bool {
        matches!(self.kind, FieldKind::GenericRelation(_) | FieldKind::GenericRelationList(_))
    }

    pub fn relation_targets(&self) -> Vec<RelationTarget> {
        match &self.kind {
            FieldKind::Relation(target) | FieldKind::RelationList(target) => vec![*target],
            FieldKind::GenericRelation(targets) | FieldKind::GenericRelationList(targets) => {
                targets.clone()
            }
            _ => Vec::new(),
        }
    }

    /// The relation target for entities of `collection`
    pub fn target_for(&self, collection: Collection) -> Option<RelationTarget> {
        self.relation_targets()
            .into_iter()
            .find(|target| target.collection == collection)
    }

    /// JSON schema of a single (unscoped) value of this field
    pub fn schema(&self) -> Value {
        let required = self.required;
        let nullable = |ty: &str| -> Value {
            if required {
                json!(ty)
            } else {
                json!([ty, "null"])
            }
        };

        let mut schema = match &self.kind {
            FieldKind::Integer | FieldKind::Timestamp => json!({ "type": nullable("integer") }),
            FieldKind::Boolean => json!({ "type": nullable("boolean") }),
            FieldKind::Float => json!({ "type": nullable("number") }),
            FieldKind::Text | FieldKind::HtmlStrict | FieldKind::HtmlPermissive => {
                let mut text = json!({ "type": nullable("string") });
                if required {
                    text["minLength"] = json!(1);
                }
                text
            }
            FieldKind::Char => {
                let mut text = json!({ "type": nullable("string"), "maxLength": 256 });
                if required {
                    text["minLength"] = json!(1);
                }
                text
            }
            FieldKind::Color => json!({
                "type": nullable("string"),
                "pattern": schema::COLOR_PATTERN,
            }),
            FieldKind::Json => {
                if required {
                    json!({ "type": "object", "minProperties": 1 })
                } else {
                    json!({ "type": ["object", "null"] })
                }
            }
            FieldKind::Decimal => json!({
                "type": nullable("string"),
                "pattern": schema::DECIMAL_PATTERN,
            }),
            FieldKind::CharArray => json!({
                "type": nullable("array"),
                "items": { "type": "string", "maxLength": 256 },
            }),
            FieldKind::NumberArray => json!({
                "type": nullable("array"),
                "items": { "type": "integer" },
            }),
            FieldKind::Relation(_) => {
                if required {
                    schema::required_id_schema()
                } else {
                    schema::optional_id_schema()
                }
            }
            FieldKind::RelationList(_) => schema::id_list_schema(),
            FieldKind::GenericRelation(_) => {
                if required {
                    schema::required_fqid_schema()
                } else {
                    schema::optional_fqid_schema()
                }
            }
            FieldKind::GenericRelationList(_) => schema::fqid_list_schema(),
        };

        if let Value::Object(map) = &mut schema {
            for (keyword, value) in &self.constraints {
                let mut value = value.clone();
                if keyword == "enum" && !required {
                    if let Value::Array(options) = &mut value {
                        options.push(Value::Null);
                    }
                }
                map.insert(keyword.clone(), value);
            }
        }

        schema
    }

    /// JSON schema of the value as stored, template fields become a mapping
    pub fn payload_schema(&self) -> Value {
        if self.template {
            let mut properties = Map::new();
            properties.insert(schema::ID_PATTERN.to_string(), self.schema());
            json!({
                "type": "object",
                "patternProperties": Value::Object(properties),
                "additionalProperties": false,
            })
        } else {
            self.schema()
        }
    }

    /// Sanitize an incoming value; template fields are sanitized per scope
    pub fn validate(&self, value: Value) -> Result<Value, FieldError> {
        if value.is_null() {
            return Ok(value);
        }
        if !self.template {
            return self.validate_value(value);
        }

        match value {
            Value::Object(scoped) => {
                let mut out = Map::new();
                for (scope, inner) in scoped {
                    out.insert(scope, self.validate_value(inner)?);
                }
                Ok(Value::Object(out))
            }
            _ => Err(FieldError::NotAMapping {
                field: self.name.to_string(),
            }),
        }
    }

    /// Sanitize a single unscoped value
    pub fn validate_value(&self, value: Value) -> Result<Value, FieldError> {
        match (&self.kind, value) {
            (FieldKind::HtmlStrict, Value::String(html)) => {
                Ok(Value::String(validate_html(&html, ALLOWED_HTML_TAGS_STRICT)))
            }
            (FieldKind::HtmlPermissive, Value::String(html)) => {
                Ok(Value::String(validate_html(&html, ALLOWED_HTML_TAGS_PERMISSIVE)))
            }
            (FieldKind::Decimal, Value::String(raw)) => {
                let decimal = Decimal::from_str(raw.trim()).map_err(|_| FieldError::InvalidDecimal {
                    field: self.name.to_string(),
                    value: raw.clone(),
                })?;
                Ok(Value::String(format!("{:.6}", decimal.round_dp(6))))
            }
            (FieldKind::GenericRelation(_), Value::String(raw)) => {
                self.check_generic_target(&raw)?;
                Ok(Value::String(raw))
            }
            (FieldKind::GenericRelationList(_), Value::Array(items)) => {
                for item in &items {
                    if let Value::String(raw) = item {
                        self.check_generic_target(raw)?;
                    }
                }
                Ok(Value::Array(items))
            }
            (_, value) => Ok(value),
        }
    }

    fn check_generic_target(&self, raw: &str) -> Result<Fqid, FieldError> {
        let fqid: Fqid = raw.parse().map_err(|source| FieldError::InvalidFqid {
            field: self.name.to_string(),
            source,
        })?;
        if self.target_for(fqid.collection).is_none() {
            return Err(FieldError::InvalidTarget {
                field: self.name.to_string(),
                collection: fqid.collection,
            });
        }
        Ok(fqid)
    }
}
