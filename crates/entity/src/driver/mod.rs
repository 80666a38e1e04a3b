//! Storage Driver Contract
//!
//! Every storage backend exposes the same four operations. Each entity type
//! is bound to one driver through the [`DriverRegistry`]; the entity layer
//! never knows which backend it is talking to.

use async_trait::async_trait;

use crate::entity::{EntityType, Record};
use crate::error::DriverResult;
use crate::query::{Query, QueryResult};

pub mod memory;
pub mod registry;

pub use memory::MemoryDriver;
pub use registry::DriverRegistry;

/// Storage capability bound to entity types
#[async_trait]
pub trait Driver: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str {
        "driver"
    }

    /// Fetch a single record, or an empty result
    async fn find_one(&self, entity_type: &EntityType, query: &Query) -> DriverResult<QueryResult>;

    /// Fetch every matching record in storage order
    async fn find(&self, entity_type: &EntityType, query: &Query) -> DriverResult<QueryResult>;

    /// Create or update the record. A newly assigned identifier is written
    /// into `record`.
    async fn save(&self, record: &mut Record) -> DriverResult<QueryResult>;

    /// Delete the record
    async fn delete(&self, record: &Record) -> DriverResult<QueryResult>;
}
