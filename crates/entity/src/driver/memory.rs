//! In-memory storage driver
//!
//! Rows are kept per entity type in insertion order, so `find` returns them
//! in the order they were first saved. New records get a uuid v4 identifier.

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::Driver;
use crate::entity::{EntityId, EntityType, Record};
use crate::error::{DriverError, DriverResult};
use crate::query::{Query, QueryResult, Row};

/// Process-local driver backed by a `DashMap` of row lists
#[derive(Debug, Default)]
pub struct MemoryDriver {
    tables: DashMap<String, Vec<Row>>,
}

impl MemoryDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a row directly, bypassing `save`
    pub fn insert_row(&self, entity_type: &EntityType, row: Row) {
        self.tables
            .entry(entity_type.name().to_string())
            .or_default()
            .push(row);
    }

    /// Every stored row of a type, in storage order
    pub fn rows(&self, entity_type: &EntityType) -> Vec<Row> {
        self.tables
            .get(entity_type.name())
            .map(|rows| rows.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, entity_type: &EntityType) -> usize {
        self.tables.get(entity_type.name()).map_or(0, |rows| rows.len())
    }

    fn row_id(row: &Row) -> Option<EntityId> {
        row.get("id").and_then(EntityId::from_json)
    }
}

#[async_trait]
impl Driver for MemoryDriver {
    fn name(&self) -> &str {
        "memory"
    }

    async fn find_one(&self, entity_type: &EntityType, query: &Query) -> DriverResult<QueryResult> {
        let found = self
            .tables
            .get(entity_type.name())
            .and_then(|rows| rows.iter().find(|row| query.matches(row)).cloned());

        Ok(found.map_or_else(QueryResult::empty, QueryResult::single))
    }

    async fn find(&self, entity_type: &EntityType, query: &Query) -> DriverResult<QueryResult> {
        let rows = self
            .tables
            .get(entity_type.name())
            .map(|rows| rows.iter().filter(|row| query.matches(row)).cloned().collect())
            .unwrap_or_default();

        Ok(QueryResult::list(rows))
    }

    async fn save(&self, record: &mut Record) -> DriverResult<QueryResult> {
        if record.id().is_none() {
            record.set_id(EntityId::new(Uuid::new_v4().to_string()));
        }
        let row = record.to_row();
        let id = record.id().cloned();

        let mut rows = self
            .tables
            .entry(record.entity_type().name().to_string())
            .or_default();

        match rows.iter_mut().find(|existing| Self::row_id(existing) == id) {
            Some(existing) => *existing = row.clone(),
            None => rows.push(row.clone()),
        }

        tracing::debug!("memory driver saved {} {:?}", record.entity_type(), id);
        Ok(QueryResult::single(row))
    }

    async fn delete(&self, record: &Record) -> DriverResult<QueryResult> {
        let id = record.id().cloned().ok_or_else(|| {
            DriverError::backend(
                record.entity_type().name(),
                "cannot delete a record without an id",
            )
        })?;

        if let Some(mut rows) = self.tables.get_mut(record.entity_type().name()) {
            rows.retain(|row| Self::row_id(row).as_ref() != Some(&id));
        }

        tracing::debug!("memory driver deleted {} {}", record.entity_type(), id);
        Ok(QueryResult::empty())
    }
}
