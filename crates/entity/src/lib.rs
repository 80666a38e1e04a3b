//! # elif-entity: Entity layer for elif.rs
//!
//! Entities with typed, lazily-loaded relation attributes. A many-to-many
//! relation is materialized through an explicit link table: loading it
//! enumerates the owner's link rows and resolves each one to its target,
//! saving it writes only the link rows and targets that changed.
//!
//! Storage is reached exclusively through the [`Driver`] trait. Drivers are
//! bound per entity type in a [`DriverRegistry`] that is passed to every
//! [`Entity`] at construction.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use elif_entity::{DriverRegistry, Entity, EntityType, MemoryDriver, RelationDescriptor};
//!
//! # async fn example() -> elif_entity::EntityResult<()> {
//! let link_type = EntityType::new("UsersGroups");
//! let groups = RelationDescriptor::new("groups", link_type, EntityType::new("Group"))
//!     .owner_field("user")
//!     .target_field("group");
//! let user_type = EntityType::new("User").with_relation(groups);
//!
//! let drivers = Arc::new(DriverRegistry::with_default(Arc::new(MemoryDriver::new())));
//! let mut user = Entity::new(user_type, drivers);
//! user.set_related_json("groups", serde_json::json!([{"name": "Group P"}]))?;
//! user.save().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod driver;
pub mod entity;
pub mod error;
pub mod query;
pub mod relation;

pub use config::{ConfigError, EntityConfig, TargetResolution};
pub use driver::{Driver, DriverRegistry, MemoryDriver};
pub use entity::{Entity, EntityId, EntityRef, EntityType, Record};
pub use error::*;
pub use query::{Query, QueryResult, Row};
pub use relation::{
    LinkedEntitiesLoader, LinkedEntity, RelatedInput, RelationAttributeValue, RelationDescriptor,
    RelationPhase, RelationState, SaveOrchestrator, SaveSummary,
};
