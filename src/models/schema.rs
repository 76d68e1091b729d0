// Shared JSON schema fragments

use serde_json::{json, Value};

pub const ID_PATTERN: &str = r"^[1-9][0-9]*$";
pub const FQID_PATTERN: &str = r"^[a-z]([a-z_]*[a-z])?/[1-9][0-9]*$";
pub const DECIMAL_PATTERN: &str = r"^-?(\d|[1-9]\d+)(\.\d{1,6})?$";
pub const COLOR_PATTERN: &str = r"^#[0-9a-f]{6}$";

pub const MAX_ID: i64 = i64::MAX;

pub fn required_id_schema() -> Value {
    json!({ "type": "integer", "minimum": 1, "maximum": MAX_ID })
}

pub fn optional_id_schema() -> Value {
    json!({ "type": ["integer", "null"], "minimum": 1, "maximum": MAX_ID })
}

pub fn id_list_schema() -> Value {
    json!({
        "type": "array",
        "items": required_id_schema(),
        "uniqueItems": true,
    })
}

pub fn required_fqid_schema() -> Value {
    json!({ "type": "string", "pattern": FQID_PATTERN, "minLength": 1 })
}

pub fn optional_fqid_schema() -> Value {
    json!({ "type": ["string", "null"], "pattern": FQID_PATTERN })
}

pub fn fqid_list_schema() -> Value {
    json!({
        "type": "array",
        "items": required_fqid_schema(),
        "uniqueItems": true,
    })
}
