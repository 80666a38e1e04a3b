//! Query arguments and the uniform driver response envelope

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::entity::EntityId;

/// A raw storage record as returned by a driver
pub type Row = Map<String, JsonValue>;

/// Field-equality query passed to `find` / `find_one`.
///
/// Serializes as `{"query": {...}}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub query: Map<String, JsonValue>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{query: {id: <id>}}`
    pub fn by_id(id: &EntityId) -> Self {
        Self::eq("id", id.to_json())
    }

    /// `{query: {<field>: <value>}}`
    pub fn eq(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::new().and(field, value)
    }

    /// Add another equality condition
    pub fn and(mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.query.insert(field.into(), value.into());
        self
    }

    /// Check whether a row satisfies every condition
    pub fn matches(&self, row: &Row) -> bool {
        self.query
            .iter()
            .all(|(field, expected)| row.get(field).map_or(expected.is_null(), |v| v == expected))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Payload {
    Empty,
    Single(Row),
    List(Vec<Row>),
}

/// Uniform wrapper around a driver response: one record, a list, or nothing.
///
/// Never mutated after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    payload: Payload,
    meta: Map<String, JsonValue>,
}

impl Default for QueryResult {
    fn default() -> Self {
        Self::empty()
    }
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            payload: Payload::Empty,
            meta: Map::new(),
        }
    }

    pub fn single(row: Row) -> Self {
        Self {
            payload: Payload::Single(row),
            meta: Map::new(),
        }
    }

    pub fn list(rows: Vec<Row>) -> Self {
        Self {
            payload: Payload::List(rows),
            meta: Map::new(),
        }
    }

    /// Build from a JSON response: an object is a single record, an array of
    /// objects a list, anything else is empty
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(row) => Self::single(row),
            JsonValue::Array(items) => Self::list(
                items
                    .into_iter()
                    .filter_map(|item| match item {
                        JsonValue::Object(row) => Some(row),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => Self::empty(),
        }
    }

    /// Attach driver metadata such as a total count
    pub fn with_meta(mut self, meta: Map<String, JsonValue>) -> Self {
        self.meta = meta;
        self
    }

    pub fn meta(&self) -> &Map<String, JsonValue> {
        &self.meta
    }

    pub fn is_empty(&self) -> bool {
        match &self.payload {
            Payload::Empty => true,
            Payload::Single(_) => false,
            Payload::List(rows) => rows.is_empty(),
        }
    }

    pub fn len(&self) -> usize {
        match &self.payload {
            Payload::Empty => 0,
            Payload::Single(_) => 1,
            Payload::List(rows) => rows.len(),
        }
    }

    /// The single record, or the first of a list
    pub fn first(&self) -> Option<&Row> {
        match &self.payload {
            Payload::Empty => None,
            Payload::Single(row) => Some(row),
            Payload::List(rows) => rows.first(),
        }
    }

    /// All records in driver order
    pub fn rows(&self) -> Vec<&Row> {
        match &self.payload {
            Payload::Empty => Vec::new(),
            Payload::Single(row) => vec![row],
            Payload::List(rows) => rows.iter().collect(),
        }
    }

    pub fn into_first(self) -> Option<Row> {
        match self.payload {
            Payload::Empty => None,
            Payload::Single(row) => Some(row),
            Payload::List(rows) => rows.into_iter().next(),
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self.payload {
            Payload::Empty => Vec::new(),
            Payload::Single(row) => vec![row],
            Payload::List(rows) => rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: JsonValue) -> Row {
        match value {
            JsonValue::Object(map) => map,
            _ => Row::new(),
        }
    }

    #[test]
    fn test_query_serializes_with_query_envelope() {
        let query = Query::eq("user", "A");
        assert_eq!(serde_json::to_value(&query).unwrap(), json!({"query": {"user": "A"}}));

        let by_id = Query::by_id(&EntityId::from("X"));
        assert_eq!(serde_json::to_value(&by_id).unwrap(), json!({"query": {"id": "X"}}));
    }

    #[test]
    fn test_query_matching() {
        let query = Query::eq("user", "A").and("group", "X");
        assert!(query.matches(&row(json!({"id": "1", "user": "A", "group": "X"}))));
        assert!(!query.matches(&row(json!({"id": "2", "user": "A", "group": "Y"}))));
        assert!(!query.matches(&row(json!({"id": "3", "group": "X"}))));
    }

    #[test]
    fn test_result_shapes() {
        let empty = QueryResult::empty();
        assert!(empty.is_empty());
        assert!(empty.first().is_none());

        let single = QueryResult::single(row(json!({"id": "A"})));
        assert_eq!(single.len(), 1);
        assert_eq!(single.first().and_then(|r| r.get("id")), Some(&json!("A")));

        let list = QueryResult::from_json(json!([{"id": "1st"}, {"id": "2nd"}, 3]));
        assert_eq!(list.len(), 2);
        let ids: Vec<_> = list.into_rows().into_iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!("1st"), json!("2nd")]);
    }

    #[test]
    fn test_meta_is_carried() {
        let mut meta = Map::new();
        meta.insert("totalCount".to_string(), json!(42));
        let result = QueryResult::list(Vec::new()).with_meta(meta);
        assert_eq!(result.meta().get("totalCount"), Some(&json!(42)));
        assert!(result.is_empty());
    }
}
