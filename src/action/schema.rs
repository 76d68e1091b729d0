use jsonschema::error::ValidationErrorKind;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::action::error::ActionError;
use crate::models::{self, schema::required_id_schema, Collection, Model};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Field {field} does not exist in collection {collection}")]
    UnknownField { collection: Collection, field: String },

    #[error("Schema does not compile: {0}")]
    Compile(String),
}

/// Builds action schemas from the field definitions of a model
#[derive(Debug, Clone)]
pub struct DefaultSchema {
    model: &'static Model,
    title: String,
    properties: Map<String, Value>,
    required: Vec<String>,
    errors: Vec<String>,
}

impl DefaultSchema {
    pub fn new(collection: Collection) -> Self {
        Self {
            model: models::model(collection),
            title: format!("{} schema", collection),
            properties: Map::new(),
            required: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Schema for create actions
    pub fn create(collection: Collection, required: &[&str], optional: &[&str]) -> Self {
        Self::new(collection)
            .title(format!("{} create schema", collection))
            .required_fields(required)
            .optional_fields(optional)
    }

    /// Schema for update actions, `id` is always required
    pub fn update(collection: Collection, optional: &[&str]) -> Self {
        Self::new(collection)
            .title(format!("{} update schema", collection))
            .with_id()
            .optional_fields(optional)
    }

    pub fn delete(collection: Collection) -> Self {
        Self::new(collection)
            .title(format!("{} delete schema", collection))
            .with_id()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_id(self) -> Self {
        self.additional_required("id", required_id_schema())
    }

    pub fn required_fields(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.model_field(name, true, false);
        }
        self
    }

    pub fn optional_fields(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.model_field(name, false, false);
        }
        self
    }

    /// Template fields accepted as a single value for one implicit meeting
    pub fn optional_unscoped_fields(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.model_field(name, false, true);
        }
        self
    }

    pub fn additional_required(mut self, name: &str, schema: Value) -> Self {
        self.properties.insert(name.to_string(), schema);
        if !self.required.iter().any(|r| r == name) {
            self.required.push(name.to_string());
        }
        self
    }

    pub fn additional_optional(mut self, name: &str, schema: Value) -> Self {
        self.properties.insert(name.to_string(), schema);
        self
    }

    fn model_field(mut self, name: &str, required: bool, unscoped: bool) -> Self {
        match self.model.field(name) {
            Some(field) => {
                let schema = if unscoped {
                    field.schema()
                } else {
                    field.payload_schema()
                };
                if required {
                    self.additional_required(name, schema)
                } else {
                    self.properties.insert(name.to_string(), schema);
                    self
                }
            }
            None => {
                self.errors.push(name.to_string());
                self
            }
        }
    }

    pub fn build(self) -> Result<Value, SchemaError> {
        if let Some(field) = self.errors.into_iter().next() {
            return Err(SchemaError::UnknownField {
                collection: self.model.collection,
                field,
            });
        }
        let mut required = self.required;
        required.sort();
        Ok(json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "title": self.title,
            "type": "object",
            "properties": self.properties,
            "required": required,
            "additionalProperties": false,
        }))
    }
}

/// Schema of the request body: a list of `{action, data}` objects
pub fn payload_schema() -> Value {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Schema for action API",
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "action": { "type": "string", "minLength": 1 },
                "data": {
                    "type": "array",
                    "items": { "type": "object" },
                    "minItems": 1,
                },
            },
            "required": ["action", "data"],
            "additionalProperties": false,
        },
        "minItems": 1,
    })
}

/// A compiled schema that reports the first failure in a stable text form
pub struct SchemaValidator {
    schema: Value,
    validator: jsonschema::Validator,
}

impl std::fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema", &self.schema)
            .finish()
    }
}

impl SchemaValidator {
    pub fn compile(schema: Value) -> Result<Self, SchemaError> {
        let validator =
            jsonschema::validator_for(&schema).map_err(|e| SchemaError::Compile(e.to_string()))?;
        Ok(Self { schema, validator })
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn validate(&self, instance: &Value) -> Result<(), ActionError> {
        let mut missing: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut unexpected: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut other: Vec<String> = Vec::new();

        for error in self.validator.iter_errors(instance) {
            let path = display_path(&error.instance_path.to_string());
            match &error.kind {
                ValidationErrorKind::Required { property } => {
                    let name = property
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| property.to_string());
                    missing.entry(path).or_default().insert(name);
                }
                ValidationErrorKind::AdditionalProperties { unexpected: names } => {
                    unexpected.entry(path).or_default().extend(names.iter().cloned());
                }
                ValidationErrorKind::UniqueItems => {
                    other.push(format!("{} must contain unique items", path));
                }
                ValidationErrorKind::Enum { options } => {
                    other.push(format!("{} must be one of {}", path, options));
                }
                _ => other.push(format!("{}: {}", path, error)),
            }
        }

        // required properties are reported first, unknown properties last
        let message = missing
            .into_iter()
            .next()
            .map(|(path, names)| format!("{} must contain {} properties", path, py_list(&names)))
            .or_else(|| other.into_iter().next())
            .or_else(|| {
                unexpected.into_iter().next().map(|(path, names)| {
                    format!("{} must not contain {} properties", path, py_set(&names))
                })
            });

        match message {
            Some(message) => Err(ActionError::Validation(message)),
            None => Ok(()),
        }
    }
}

/// `/ids/0` becomes `data.ids[0]`
fn display_path(pointer: &str) -> String {
    let mut path = String::from("data");
    for segment in pointer.split('/').filter(|s| !s.is_empty()) {
        if segment.chars().all(|c| c.is_ascii_digit()) {
            path.push('[');
            path.push_str(segment);
            path.push(']');
        } else {
            path.push('.');
            path.push_str(segment);
        }
    }
    path
}

fn py_list(names: &BTreeSet<String>) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{}'", n)).collect();
    format!("[{}]", quoted.join(", "))
}

fn py_set(names: &BTreeSet<String>) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{}'", n)).collect();
    format!("{{{}}}", quoted.join(", "))
}
