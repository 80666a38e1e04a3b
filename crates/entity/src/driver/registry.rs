//! Driver registry - binds entity types to storage drivers
//!
//! Built once at configuration time and handed to entities by `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use super::Driver;
use crate::entity::EntityType;
use crate::error::{DriverError, DriverResult};

/// Per-entity-type driver bindings with an optional fallback
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
    default: Option<Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry where every type uses the same driver
    pub fn with_default(driver: Arc<dyn Driver>) -> Self {
        tracing::info!("Registering default driver: {}", driver.name());
        Self {
            drivers: HashMap::new(),
            default: Some(driver),
        }
    }

    /// Bind a driver to an entity type
    pub fn register(&mut self, entity_type: &EntityType, driver: Arc<dyn Driver>) {
        tracing::info!("Registering driver '{}' for entity type {}", driver.name(), entity_type);
        self.drivers.insert(entity_type.name().to_string(), driver);
    }

    /// Builder form of [`register`](Self::register)
    pub fn bind(mut self, entity_type: &EntityType, driver: Arc<dyn Driver>) -> Self {
        self.register(entity_type, driver);
        self
    }

    /// Driver bound to the type, falling back to the default driver
    pub fn driver_for(&self, entity_type: &EntityType) -> DriverResult<Arc<dyn Driver>> {
        self.drivers
            .get(entity_type.name())
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| DriverError::not_registered(entity_type.name()))
    }
}
