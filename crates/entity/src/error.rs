//! Error types for the entity layer
//!
//! Driver failures are wrapped, never swallowed: a relation load surfaces a
//! `RelationLoadError`, a persistence pass surfaces a `RelationSaveError`
//! tagged with the phase that failed, and both carry the underlying
//! `DriverError` from the storage backend.

use std::fmt;

use crate::config::ConfigError;
use crate::entity::EntityId;

/// Result type alias for entity operations
pub type EntityResult<T> = Result<T, EntityError>;

/// Result type alias for driver calls
pub type DriverResult<T> = Result<T, DriverError>;

/// Opaque failure reported by a storage driver
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("driver error for '{entity_type}': {message}")]
pub struct DriverError {
    /// Entity type the failing call was made for
    pub entity_type: String,
    /// Backend-provided description
    pub message: String,
}

impl DriverError {
    /// Wrap a backend failure
    pub fn backend(entity_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            message: message.into(),
        }
    }

    /// No driver is bound to the entity type
    pub fn not_registered(entity_type: impl Into<String>) -> Self {
        Self::backend(entity_type, "no driver registered for this entity type")
    }
}

/// Fetching link rows or their targets failed; the load was discarded
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RelationLoadError {
    #[error("failed to load link rows of '{relation}' for owner {owner}: {source}")]
    LinkRows {
        relation: String,
        owner: EntityId,
        source: DriverError,
    },

    #[error("failed to load target {target} of '{relation}' for owner {owner}: {source}")]
    Target {
        relation: String,
        owner: EntityId,
        target: EntityId,
        source: DriverError,
    },

    #[error("link row {link} of '{relation}' for owner {owner} has no usable '{field}' value")]
    MalformedLinkRow {
        relation: String,
        owner: EntityId,
        link: String,
        field: String,
    },
}

impl RelationLoadError {
    /// Identifier of the owner whose relation failed to load
    pub fn owner(&self) -> &EntityId {
        match self {
            Self::LinkRows { owner, .. }
            | Self::Target { owner, .. }
            | Self::MalformedLinkRow { owner, .. } => owner,
        }
    }

    /// Name of the relation attribute
    pub fn relation(&self) -> &str {
        match self {
            Self::LinkRows { relation, .. }
            | Self::Target { relation, .. }
            | Self::MalformedLinkRow { relation, .. } => relation,
        }
    }

    /// Underlying driver failure, if the load failed inside a driver call
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            Self::LinkRows { source, .. } | Self::Target { source, .. } => Some(source),
            Self::MalformedLinkRow { .. } => None,
        }
    }
}

/// Step of a save pass that can fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SavePhase {
    /// Saving the owner entity
    Owner,
    /// Saving a newly added target entity
    Target,
    /// Saving the link row binding owner and target
    Link,
    /// Deleting a link row that was removed from the relation
    Unlink,
}

impl fmt::Display for SavePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            SavePhase::Owner => "owner save",
            SavePhase::Target => "target save",
            SavePhase::Link => "link save",
            SavePhase::Unlink => "link delete",
        };
        write!(f, "{}", phase)
    }
}

/// A persistence pass failed; the relation's initial snapshot was not promoted
#[derive(Debug, Clone, PartialEq)]
pub struct RelationSaveError {
    /// Relation being persisted, `None` for the owner phase
    pub relation: Option<String>,
    pub phase: SavePhase,
    pub source: DriverError,
}

impl RelationSaveError {
    pub fn new(relation: Option<&str>, phase: SavePhase, source: DriverError) -> Self {
        Self {
            relation: relation.map(str::to_string),
            phase,
            source,
        }
    }
}

impl fmt::Display for RelationSaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.relation {
            Some(relation) => write!(
                f,
                "{} of relation '{}' failed: {}",
                self.phase, relation, self.source
            ),
            None => write!(f, "{} failed: {}", self.phase, self.source),
        }
    }
}

impl std::error::Error for RelationSaveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Error types for entity operations
#[derive(Debug, Clone, thiserror::Error)]
pub enum EntityError {
    #[error(transparent)]
    Load(#[from] RelationLoadError),

    #[error(transparent)]
    Save(#[from] RelationSaveError),

    #[error(transparent)]
    Driver(#[from] DriverError),

    #[error("entity type '{entity_type}' has no relation named '{relation}'")]
    UnknownRelation { entity_type: String, relation: String },

    #[error("invalid input for relation '{relation}': {reason}")]
    InvalidInput { relation: String, reason: String },

    #[error("{entity_type} has not been saved yet")]
    NotPersisted { entity_type: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
