//! Entity identifiers and entity type definitions

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::relation::RelationDescriptor;

/// Identifier of a stored entity.
///
/// Keeps the scalar the storage returned: an id read as `123` is written
/// back and queried as `123`, never as `"123"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Str(String),
}

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self::Str(id.into())
    }

    /// Read an identifier from a stored value; strings and integers qualify
    pub fn from_json(value: &JsonValue) -> Option<Self> {
        match value {
            JsonValue::String(s) if !s.is_empty() => Some(Self::Str(s.clone())),
            JsonValue::Number(n) => n.as_i64().map(Self::Int),
            _ => None,
        }
    }

    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Int(id) => JsonValue::from(*id),
            Self::Str(id) => JsonValue::String(id.clone()),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{}", id),
            Self::Str(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::Str(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self::Str(id)
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&EntityId> for JsonValue {
    fn from(id: &EntityId) -> Self {
        id.to_json()
    }
}

#[derive(Clone)]
struct EntityTypeDef {
    name: String,
    relations: Vec<Arc<RelationDescriptor>>,
}

/// A named entity type and the relations declared on it.
///
/// Cheap to clone; two types are equal when their names are.
#[derive(Clone)]
pub struct EntityType(Arc<EntityTypeDef>);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(EntityTypeDef {
            name: name.into(),
            relations: Vec::new(),
        }))
    }

    /// Declare a relation attribute on this type
    pub fn with_relation(mut self, relation: RelationDescriptor) -> Self {
        Arc::make_mut(&mut self.0).relations.push(Arc::new(relation));
        self
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn relations(&self) -> &[Arc<RelationDescriptor>] {
        &self.0.relations
    }

    pub fn relation(&self, name: &str) -> Option<&Arc<RelationDescriptor>> {
        self.0.relations.iter().find(|r| r.name == name)
    }
}

impl PartialEq for EntityType {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for EntityType {}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.0.name)
            .field(
                "relations",
                &self.0.relations.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_id_from_json() {
        assert_eq!(EntityId::from_json(&json!("X")), Some(EntityId::from("X")));
        assert_eq!(EntityId::from_json(&json!(123)), Some(EntityId::from(123_i64)));
        assert_eq!(EntityId::from_json(&json!(1.5)), None);
        assert_eq!(EntityId::from_json(&json!("")), None);
        assert_eq!(EntityId::from_json(&JsonValue::Null), None);
        assert_eq!(EntityId::from_json(&json!({"id": 1})), None);
    }

    #[test]
    fn test_entity_id_keeps_its_json_scalar() {
        assert_eq!(EntityId::from(123_i64).to_json(), json!(123));
        assert_eq!(EntityId::from("123").to_json(), json!("123"));
        assert_ne!(EntityId::from(123_i64), EntityId::from("123"));
        assert_eq!(EntityId::from(123_i64).to_string(), "123");
    }

    #[test]
    fn test_entity_type_relations() {
        let link = EntityType::new("UsersGroups");
        let group = EntityType::new("Group");
        let user = EntityType::new("User").with_relation(
            RelationDescriptor::new("groups", link, group)
                .owner_field("user")
                .target_field("group"),
        );

        assert_eq!(user.name(), "User");
        assert_eq!(user.relations().len(), 1);
        assert!(user.relation("groups").is_some());
        assert!(user.relation("roles").is_none());
        assert_eq!(user, EntityType::new("User"));
    }
}
