//! Entity System - addressable records with lazily-loaded relation attributes
//!
//! - `types`: identifiers and entity type definitions
//! - `record`: stored records and shared entity handles
//!
//! An [`Entity`] is an owner instance: its record, one relation attribute
//! per relation declared on its type, and the driver registry it was built
//! with.

pub mod record;
pub mod types;

pub use record::{EntityRef, Record};
pub use types::{EntityId, EntityType};

use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::config::EntityConfig;
use crate::driver::DriverRegistry;
use crate::error::{EntityError, EntityResult};
use crate::query::Query;
use crate::relation::{
    LinkedEntitiesLoader, RelatedInput, RelationAttributeValue, RelationDescriptor,
    SaveOrchestrator,
};

/// An owner entity instance
pub struct Entity {
    record: Record,
    relations: Vec<RelationAttributeValue>,
    drivers: Arc<DriverRegistry>,
    config: EntityConfig,
}

impl Entity {
    /// New, unsaved entity
    pub fn new(entity_type: EntityType, drivers: Arc<DriverRegistry>) -> Self {
        Self::from_record(Record::new(entity_type), drivers)
    }

    /// Wrap an existing record; relation attributes start untouched
    pub fn from_record(record: Record, drivers: Arc<DriverRegistry>) -> Self {
        let relations = record
            .entity_type()
            .relations()
            .iter()
            .map(|descriptor| RelationAttributeValue::new(descriptor.clone()))
            .collect();

        Self {
            record,
            relations,
            drivers,
            config: EntityConfig::default(),
        }
    }

    /// Replace the configuration; rejected if it fails validation
    pub fn with_config(mut self, config: EntityConfig) -> EntityResult<Self> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    /// Fetch one entity by identifier
    pub async fn find_by_id(
        entity_type: &EntityType,
        id: impl Into<EntityId>,
        drivers: &Arc<DriverRegistry>,
    ) -> EntityResult<Option<Entity>> {
        let driver = drivers.driver_for(entity_type)?;
        let result = driver.find_one(entity_type, &Query::by_id(&id.into())).await?;

        Ok(result.into_first().map(|row| {
            Entity::from_record(Record::from_row(entity_type.clone(), row), drivers.clone())
        }))
    }

    /// Fetch every entity matching the query
    pub async fn find(
        entity_type: &EntityType,
        query: &Query,
        drivers: &Arc<DriverRegistry>,
    ) -> EntityResult<Vec<Entity>> {
        let driver = drivers.driver_for(entity_type)?;
        let result = driver.find(entity_type, query).await?;

        Ok(result
            .into_rows()
            .into_iter()
            .map(|row| {
                Entity::from_record(Record::from_row(entity_type.clone(), row), drivers.clone())
            })
            .collect())
    }

    pub fn id(&self) -> Option<&EntityId> {
        self.record.id()
    }

    pub fn entity_type(&self) -> &EntityType {
        self.record.entity_type()
    }

    pub fn record(&self) -> &Record {
        &self.record
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn field(&self, name: &str) -> Option<&JsonValue> {
        self.record.field(name)
    }

    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        self.record.set_field(name, value);
    }

    /// The relation attribute value, for state inspection
    pub fn relation(&self, name: &str) -> EntityResult<&RelationAttributeValue> {
        self.relations
            .iter()
            .find(|relation| relation.name() == name)
            .ok_or_else(|| EntityError::UnknownRelation {
                entity_type: self.entity_type().name().to_string(),
                relation: name.to_string(),
            })
    }

    pub fn relations(&self) -> &[RelationAttributeValue] {
        &self.relations
    }

    /// Targets of a relation, loading them on first access
    pub async fn get_related(&self, name: &str) -> EntityResult<Vec<EntityRef>> {
        let relation = self.relation(name)?;
        let loader = self.loader(relation.descriptor());
        Ok(relation.get(self.id(), &loader).await?)
    }

    /// Discard in-memory edits of a relation and load it again
    pub async fn reload_related(&self, name: &str) -> EntityResult<Vec<EntityRef>> {
        let relation = self.relation(name)?;
        let loader = self.loader(relation.descriptor());
        Ok(relation.reload(self.id(), &loader).await?)
    }

    /// Replace a relation's members without loading it
    pub fn set_related<I, T>(&self, name: &str, members: I) -> EntityResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<RelatedInput>,
    {
        self.relation(name)?.set(self.id(), members);
        Ok(())
    }

    /// Replace a relation's members from JSON: an array of objects (plain
    /// data) and/or identifiers
    pub fn set_related_json(&self, name: &str, value: JsonValue) -> EntityResult<()> {
        let invalid = |reason: String| EntityError::InvalidInput {
            relation: name.to_string(),
            reason,
        };

        let items = match value {
            JsonValue::Array(items) => items,
            JsonValue::Null => Vec::new(),
            other => return Err(invalid(format!("expected an array, got {}", other))),
        };

        let members = items
            .into_iter()
            .map(|item| {
                let shown = item.to_string();
                RelatedInput::from_json(item).ok_or_else(|| {
                    invalid(format!("{} is neither an object nor an identifier", shown))
                })
            })
            .collect::<EntityResult<Vec<_>>>()?;

        self.set_related(name, members)
    }

    /// Save the owner, then persist every auto-saved relation
    pub async fn save(&mut self) -> EntityResult<()> {
        let orchestrator = SaveOrchestrator::new(&self.drivers);

        let owner = orchestrator.save_owner(&mut self.record).await.map_err(|err| {
            tracing::error!("Failed to save {}: {}", self.record.entity_type(), err);
            err
        })?;

        for relation in &self.relations {
            let auto_save = relation
                .descriptor()
                .auto_save
                .unwrap_or(self.config.auto_save_relations);
            if auto_save {
                orchestrator.persist(&owner, relation).await?;
            }
        }

        tracing::debug!("Saved {} {}", self.entity_type(), owner);
        Ok(())
    }

    /// Persist a single relation of an already saved owner
    pub async fn save_relation(&self, name: &str) -> EntityResult<()> {
        let relation = self.relation(name)?;
        let owner = self.id().ok_or_else(|| EntityError::NotPersisted {
            entity_type: self.entity_type().name().to_string(),
        })?;

        SaveOrchestrator::new(&self.drivers).persist(owner, relation).await?;
        Ok(())
    }

    /// Delete the owner. Relations with `auto_delete` have their stored link
    /// rows removed first; target entities are left alone.
    pub async fn delete(&mut self) -> EntityResult<()> {
        let owner = self.id().cloned().ok_or_else(|| EntityError::NotPersisted {
            entity_type: self.entity_type().name().to_string(),
        })?;
        let orchestrator = SaveOrchestrator::new(&self.drivers);

        for relation in &self.relations {
            let auto_delete = relation
                .descriptor()
                .auto_delete
                .unwrap_or(self.config.auto_delete_links);
            if !auto_delete {
                continue;
            }

            let links = self.loader(relation.descriptor()).load_links(&owner).await?;
            let deleted = orchestrator.unlink_all(relation.name(), &links).await?;
            relation.reset();
            tracing::debug!("Removed {} link rows of '{}' for {}", deleted, relation.name(), owner);
        }

        let driver = self.drivers.driver_for(self.entity_type())?;
        driver.delete(&self.record).await?;
        tracing::debug!("Deleted {} {}", self.entity_type(), owner);
        Ok(())
    }

    fn loader(&self, descriptor: &Arc<RelationDescriptor>) -> LinkedEntitiesLoader {
        LinkedEntitiesLoader::new(
            descriptor.clone(),
            self.drivers.clone(),
            self.config.target_resolution,
        )
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("record", &self.record)
            .field("relations", &self.relations)
            .finish()
    }
}
