//! Documents and queries
//!
//! Documents are schema-less JSON objects. Queries are JSON objects too:
//! each field maps either to a literal (equality match) or to a predicate
//! object built from `$gt` / `$lt` (open-interval range match). The client
//! never evaluates a query, it only serializes it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Server-assigned document identifier
pub type DocId = u64;

/// A schema-less document (field order is preserved)
pub type Document = Map<String, Value>;

/// Field injected into documents decoded from a listing
pub const ID_FIELD: &str = "_id";

/// Range operator: strictly greater than
pub const OP_GT: &str = "$gt";

/// Range operator: strictly less than
pub const OP_LT: &str = "$lt";

/// A FIND query
///
/// ```
/// use fluxdb::Query;
/// use serde_json::json;
///
/// let q = Query::new().eq("role", "admin").range("level", 10, 20);
/// assert_eq!(
///     q.to_value(),
///     json!({"role": "admin", "level": {"$gt": 10, "$lt": 20}})
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Query {
    fields: Map<String, Value>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match documents whose `field` equals `value`
    pub fn eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    /// Match documents whose `field` is strictly greater than `bound`
    pub fn gt(self, field: impl Into<String>, bound: impl Into<Value>) -> Self {
        self.predicate(field.into(), OP_GT, bound.into())
    }

    /// Match documents whose `field` is strictly less than `bound`
    pub fn lt(self, field: impl Into<String>, bound: impl Into<Value>) -> Self {
        self.predicate(field.into(), OP_LT, bound.into())
    }

    /// Match documents whose `field` lies in the open interval `(low, high)`
    pub fn range(
        self,
        field: impl Into<String>,
        low: impl Into<Value>,
        high: impl Into<Value>,
    ) -> Self {
        let field = field.into();
        self.predicate(field.clone(), OP_GT, low.into())
            .predicate(field, OP_LT, high.into())
    }

    // Merges into an existing predicate object; an earlier literal on the
    // same field is replaced.
    fn predicate(mut self, field: String, op: &str, bound: Value) -> Self {
        let entry = self
            .fields
            .entry(field)
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        if let Value::Object(ops) = entry {
            ops.insert(op.to_string(), bound);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

impl From<Map<String, Value>> for Query {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// Build a document from a `json!` object literal
///
/// Returns `None` when `value` is not an object.
pub fn document_from(value: Value) -> Option<Document> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_equality_and_range() {
        let q = Query::new().eq("xp", 10).gt("level", 3).lt("level", 9);
        assert_eq!(q.len(), 2);
        assert_eq!(q.to_value(), json!({"xp": 10, "level": {"$gt": 3, "$lt": 9}}));
    }

    #[test]
    fn test_predicate_replaces_literal() {
        let q = Query::new().eq("level", 5).lt("level", 9);
        assert_eq!(q.to_value(), json!({"level": {"$lt": 9}}));
    }

    #[test]
    fn test_document_from_rejects_non_objects() {
        assert!(document_from(json!([1, 2])).is_none());
        assert_eq!(document_from(json!({"a": 1})).unwrap().len(), 1);
    }
}
