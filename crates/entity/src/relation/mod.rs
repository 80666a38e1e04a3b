//! Relations Module - many-to-many attributes materialized through link tables

pub mod descriptor;
pub mod loader;
pub mod save;
pub mod value;

pub use descriptor::RelationDescriptor;
pub use loader::{LinkedEntitiesLoader, LoadResult};
pub use save::{SaveOrchestrator, SaveSummary};
pub use value::{LinkedEntity, RelatedInput, RelationAttributeValue, RelationPhase, RelationState};
