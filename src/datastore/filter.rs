use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::models::Entity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "=")] Eq,
    #[serde(rename = "!=")] Ne,
    #[serde(rename = "<")] Lt,
    #[serde(rename = "<=")] Lte,
    #[serde(rename = ">")] Gt,
    #[serde(rename = ">=")] Gte,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterOperator {
    pub field: String,
    pub operator: FilterOp,
    pub value: Value,
}

/// Datastore filter, serialized in the reader service format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Filter {
    And { and_filter: Vec<Filter> },
    Or { or_filter: Vec<Filter> },
    Not { not_filter: Box<Filter> },
    Operator(FilterOperator),
}

impl Filter {
    pub fn new(field: impl Into<String>, operator: FilterOp, value: impl Into<Value>) -> Self {
        Filter::Operator(FilterOperator {
            field: field.into(),
            operator,
            value: value.into(),
        })
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOp::Ne, value)
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And { and_filter: filters }
    }

    pub fn or(filters: Vec<Filter>) -> Self {
        Filter::Or { or_filter: filters }
    }

    pub fn not(filter: Filter) -> Self {
        Filter::Not {
            not_filter: Box::new(filter),
        }
    }

    /// Evaluate the filter against an entity; missing fields compare as null
    pub fn matches(&self, entity: &Entity) -> bool {
        match self {
            Filter::And { and_filter } => and_filter.iter().all(|f| f.matches(entity)),
            Filter::Or { or_filter } => or_filter.iter().any(|f| f.matches(entity)),
            Filter::Not { not_filter } => !not_filter.matches(entity),
            Filter::Operator(op) => {
                let actual = entity.get(&op.field).unwrap_or(&Value::Null);
                match op.operator {
                    FilterOp::Eq => actual == &op.value,
                    FilterOp::Ne => actual != &op.value,
                    FilterOp::Lt => compare(actual, &op.value) == Some(Ordering::Less),
                    FilterOp::Lte => matches!(
                        compare(actual, &op.value),
                        Some(Ordering::Less | Ordering::Equal)
                    ),
                    FilterOp::Gt => compare(actual, &op.value) == Some(Ordering::Greater),
                    FilterOp::Gte => matches!(
                        compare(actual, &op.value),
                        Some(Ordering::Greater | Ordering::Equal)
                    ),
                }
            }
        }
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => l.as_f64()?.partial_cmp(&r.as_f64()?),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(value: Value) -> Entity {
        match value {
            Value::Object(map) => map,
            _ => panic!("entity fixture must be an object"),
        }
    }

    #[test]
    fn test_operator_matching() {
        let poll = entity(json!({ "state": "created", "weight": 10 }));
        assert!(Filter::eq("state", "created").matches(&poll));
        assert!(Filter::ne("state", "started").matches(&poll));
        assert!(Filter::new("weight", FilterOp::Gte, 10).matches(&poll));
        assert!(!Filter::new("weight", FilterOp::Lt, 10).matches(&poll));
        assert!(Filter::eq("missing", Value::Null).matches(&poll));
    }

    #[test]
    fn test_composite_matching() {
        let user = entity(json!({ "username": "admin", "id": 1 }));
        let filter = Filter::and(vec![
            Filter::eq("username", "admin"),
            Filter::not(Filter::eq("id", 1)),
        ]);
        assert!(!filter.matches(&user));
        assert!(Filter::or(vec![Filter::eq("id", 2), Filter::eq("id", 1)]).matches(&user));
    }

    #[test]
    fn test_reader_wire_format() {
        let filter = Filter::and(vec![Filter::eq("meeting_id", 1)]);
        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({ "and_filter": [{ "field": "meeting_id", "operator": "=", "value": 1 }] })
        );
        let back: Filter = serde_json::from_value(serde_json::to_value(&filter).unwrap()).unwrap();
        assert_eq!(back, filter);
    }
}
