//! Relation descriptors - how a many-to-many relation maps onto its link table

use serde_json::Value as JsonValue;

use crate::entity::{EntityId, EntityType, Record};
use crate::query::{Query, Row};

/// Describes a relation attribute materialized through a link table.
///
/// Each link row holds the owner's identifier in `owner_field` and the
/// target's identifier in `target_field`.
#[derive(Debug, Clone)]
pub struct RelationDescriptor {
    /// Attribute name on the owner
    pub name: String,
    pub link_type: EntityType,
    pub target_type: EntityType,
    pub owner_field: String,
    pub target_field: String,
    /// Persist with the owner's save; `None` defers to `EntityConfig`
    pub auto_save: Option<bool>,
    /// Remove link rows when the owner is deleted; `None` defers to `EntityConfig`
    pub auto_delete: Option<bool>,
}

impl RelationDescriptor {
    /// New descriptor. The target field defaults to the lowercased target
    /// type name and the owner field to `owner`.
    pub fn new(name: impl Into<String>, link_type: EntityType, target_type: EntityType) -> Self {
        let target_field = target_type.name().to_lowercase();
        Self {
            name: name.into(),
            link_type,
            target_type,
            owner_field: "owner".to_string(),
            target_field,
            auto_save: None,
            auto_delete: None,
        }
    }

    pub fn owner_field(mut self, field: impl Into<String>) -> Self {
        self.owner_field = field.into();
        self
    }

    pub fn target_field(mut self, field: impl Into<String>) -> Self {
        self.target_field = field.into();
        self
    }

    pub fn auto_save(mut self, enabled: bool) -> Self {
        self.auto_save = Some(enabled);
        self
    }

    pub fn auto_delete(mut self, enabled: bool) -> Self {
        self.auto_delete = Some(enabled);
        self
    }

    /// `{query: {<owner_field>: <owner>}}`
    pub fn link_query(&self, owner: &EntityId) -> Query {
        Query::eq(self.owner_field.clone(), owner.to_json())
    }

    /// Identifier of the target a link row points at
    pub fn target_ref(&self, link_row: &Row) -> Option<EntityId> {
        link_row.get(&self.target_field).and_then(EntityId::from_json)
    }

    /// Not-yet-persisted link row for a target
    pub fn placeholder_link(&self, owner: Option<&EntityId>, target: Option<&EntityId>) -> Record {
        let mut link = Record::new(self.link_type.clone());
        link.set_field(self.owner_field.clone(), id_or_null(owner));
        link.set_field(self.target_field.clone(), id_or_null(target));
        link
    }

    /// Point a link row at the given owner and target
    pub fn bind_link(&self, link: &mut Record, owner: &EntityId, target: &EntityId) {
        link.set_field(self.owner_field.clone(), owner.to_json());
        link.set_field(self.target_field.clone(), target.to_json());
    }
}

fn id_or_null(id: Option<&EntityId>) -> JsonValue {
    id.map_or(JsonValue::Null, EntityId::to_json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn groups() -> RelationDescriptor {
        RelationDescriptor::new("groups", EntityType::new("UsersGroups"), EntityType::new("Group"))
            .owner_field("user")
    }

    #[test]
    fn test_defaults() {
        let descriptor = groups();
        assert_eq!(descriptor.target_field, "group");
        assert_eq!(descriptor.owner_field, "user");
        assert!(descriptor.auto_save.is_none());
    }

    #[test]
    fn test_link_query_uses_owner_field() {
        let query = groups().link_query(&EntityId::from("A"));
        assert_eq!(query, Query::eq("user", "A"));
    }

    #[test]
    fn test_placeholder_and_bind() {
        let descriptor = groups();
        let mut link = descriptor.placeholder_link(None, None);
        assert!(link.id().is_none());
        assert_eq!(link.field("user"), Some(&JsonValue::Null));

        descriptor.bind_link(&mut link, &EntityId::from("A"), &EntityId::from("X"));
        assert_eq!(link.field("user"), Some(&json!("A")));
        assert_eq!(descriptor.target_ref(link.fields()), Some(EntityId::from("X")));
    }
}
