//! Stored records and shared entity handles

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value as JsonValue;

use super::types::{EntityId, EntityType};
use crate::query::Row;

/// A single entity's data: its type, identifier (null until first save) and fields
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    entity_type: EntityType,
    id: Option<EntityId>,
    fields: Row,
}

impl Record {
    /// New, unsaved record
    pub fn new(entity_type: EntityType) -> Self {
        Self {
            entity_type,
            id: None,
            fields: Row::new(),
        }
    }

    /// Build a record from a storage row; the `id` column becomes the identifier
    pub fn from_row(entity_type: EntityType, mut row: Row) -> Self {
        let id = row.remove("id").as_ref().and_then(EntityId::from_json);
        Self {
            entity_type,
            id,
            fields: row,
        }
    }

    /// Storage representation, `id` included (null when unsaved)
    pub fn to_row(&self) -> Row {
        let mut row = self.fields.clone();
        row.insert(
            "id".to_string(),
            self.id.as_ref().map_or(JsonValue::Null, EntityId::to_json),
        );
        row
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn id(&self) -> Option<&EntityId> {
        self.id.as_ref()
    }

    pub fn set_id(&mut self, id: EntityId) {
        self.id = Some(id);
    }

    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.fields.get(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn fields(&self) -> &Row {
        &self.fields
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.set_field(name, value);
        self
    }
}

/// Shared handle to a record.
///
/// Relation snapshots hold these, so an entity appearing in both the
/// initial and current snapshot is the same handle. Driver-assigned
/// identifiers are written back through the handle.
#[derive(Clone)]
pub struct EntityRef(Arc<RwLock<Record>>);

impl EntityRef {
    pub fn new(record: Record) -> Self {
        Self(Arc::new(RwLock::new(record)))
    }

    pub fn from_row(entity_type: EntityType, row: Row) -> Self {
        Self::new(Record::from_row(entity_type, row))
    }

    pub fn id(&self) -> Option<EntityId> {
        self.0.read().id.clone()
    }

    pub fn entity_type(&self) -> EntityType {
        self.0.read().entity_type.clone()
    }

    pub fn field(&self, name: &str) -> Option<JsonValue> {
        self.0.read().fields.get(name).cloned()
    }

    pub fn set_field(&self, name: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.write().set_field(name, value);
    }

    /// Copy of the current record, handed to drivers
    pub fn snapshot(&self) -> Record {
        self.0.read().clone()
    }

    /// Replace the record with a driver's saved copy
    pub fn replace(&self, record: Record) {
        *self.0.write() = record;
    }

    /// Same handle
    pub fn ptr_eq(&self, other: &EntityRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Same handle, or two persisted records of the same type and identifier
    pub fn same_entity(&self, other: &EntityRef) -> bool {
        if self.ptr_eq(other) {
            return true;
        }
        let (left, right) = (self.0.read(), other.0.read());
        match (&left.id, &right.id) {
            (Some(a), Some(b)) => a == b && left.entity_type == right.entity_type,
            _ => false,
        }
    }
}

impl From<Record> for EntityRef {
    fn from(record: Record) -> Self {
        Self::new(record)
    }
}

impl fmt::Debug for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.0.read();
        f.debug_struct("EntityRef")
            .field("type", &record.entity_type.name())
            .field("id", &record.id)
            .field("fields", &record.fields)
            .finish()
    }
}
