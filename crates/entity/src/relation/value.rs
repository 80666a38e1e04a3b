//! Relation attribute value - per-instance state of a many-to-many attribute
//!
//! Holds two snapshots of `(target, link row)` pairs: `initial`, as last
//! loaded or saved, and `current`, as edited by the caller. Keeping the link
//! row next to its target means the two sequences can never drift apart.
//!
//! Loading is single-flight: the first `get()` on an empty attribute stores
//! a shared handle to the in-flight load and every later `get()` awaits that
//! same handle. A `set()` while the load is in flight bumps the load
//! generation, so the stale result is discarded when it arrives.

use std::sync::Arc;

use futures::future::{FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;

use super::descriptor::RelationDescriptor;
use super::loader::{LinkedEntitiesLoader, LoadResult};
use crate::entity::{EntityId, EntityRef, Record};
use crate::error::RelationLoadError;
use crate::query::Row;

/// A target entity together with the link row binding it to the owner
#[derive(Debug, Clone)]
pub struct LinkedEntity {
    pub target: EntityRef,
    pub link: EntityRef,
}

/// Anything `set()` accepts as a relation member
#[derive(Debug, Clone)]
pub enum RelatedInput {
    /// An existing entity handle
    Entity(EntityRef),
    /// Plain data for a new target; an `id` key is honoured
    Data(Row),
    /// Reference to a stored target by identifier
    Id(EntityId),
}

impl RelatedInput {
    /// Objects become `Data`, strings and numbers become `Id`
    pub fn from_json(value: JsonValue) -> Option<Self> {
        match value {
            JsonValue::Object(row) => Some(Self::Data(row)),
            other => EntityId::from_json(&other).map(Self::Id),
        }
    }
}

impl From<EntityRef> for RelatedInput {
    fn from(entity: EntityRef) -> Self {
        Self::Entity(entity)
    }
}

impl From<&EntityRef> for RelatedInput {
    fn from(entity: &EntityRef) -> Self {
        Self::Entity(entity.clone())
    }
}

impl From<Row> for RelatedInput {
    fn from(row: Row) -> Self {
        Self::Data(row)
    }
}

impl From<EntityId> for RelatedInput {
    fn from(id: EntityId) -> Self {
        Self::Id(id)
    }
}

/// Loading phase of a relation attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationPhase {
    /// Never loaded nor assigned
    Empty,
    /// A load is in flight
    Loading,
    /// Populated from storage (or promoted by a save)
    Loaded,
    /// Replaced by the caller before a load completed
    Assigned,
}

/// The `{loading, loaded}` flag pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationState {
    pub loading: bool,
    pub loaded: bool,
}

type PendingLoad = Shared<futures::future::BoxFuture<'static, LoadResult>>;

enum Phase {
    Empty,
    Loading(PendingLoad),
    Loaded,
    Assigned,
}

struct Snapshots {
    phase: Phase,
    /// Bumped by every load start, `set()` and `reload()`
    generation: u64,
    initial: Vec<LinkedEntity>,
    current: Vec<LinkedEntity>,
}

/// What a save pass has to reconcile
pub(crate) struct PendingChanges {
    pub generation: u64,
    pub initial: Vec<LinkedEntity>,
    pub current: Vec<LinkedEntity>,
}

/// Lazy container for one relation attribute of one owner instance
pub struct RelationAttributeValue {
    descriptor: Arc<RelationDescriptor>,
    inner: Mutex<Snapshots>,
}

impl RelationAttributeValue {
    pub fn new(descriptor: Arc<RelationDescriptor>) -> Self {
        Self {
            descriptor,
            inner: Mutex::new(Snapshots {
                phase: Phase::Empty,
                generation: 0,
                initial: Vec::new(),
                current: Vec::new(),
            }),
        }
    }

    pub fn descriptor(&self) -> &Arc<RelationDescriptor> {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn phase(&self) -> RelationPhase {
        match self.inner.lock().phase {
            Phase::Empty => RelationPhase::Empty,
            Phase::Loading(_) => RelationPhase::Loading,
            Phase::Loaded => RelationPhase::Loaded,
            Phase::Assigned => RelationPhase::Assigned,
        }
    }

    /// `{loading, loaded}`; an assigned attribute reports neither
    pub fn state(&self) -> RelationState {
        let phase = self.phase();
        RelationState {
            loading: phase == RelationPhase::Loading,
            loaded: phase == RelationPhase::Loaded,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.phase() == RelationPhase::Loaded
    }

    /// Whether `current` differs from what is persisted
    pub fn is_dirty(&self) -> bool {
        let inner = self.inner.lock();
        match inner.phase {
            Phase::Assigned => true,
            Phase::Empty | Phase::Loading(_) => false,
            Phase::Loaded => {
                inner.initial.len() != inner.current.len()
                    || inner
                        .initial
                        .iter()
                        .zip(&inner.current)
                        .any(|(a, b)| !a.link.ptr_eq(&b.link) || !a.target.ptr_eq(&b.target))
            }
        }
    }

    pub fn current(&self) -> Vec<EntityRef> {
        targets(&self.inner.lock().current)
    }

    pub fn initial(&self) -> Vec<EntityRef> {
        targets(&self.inner.lock().initial)
    }

    pub fn current_links(&self) -> Vec<EntityRef> {
        links(&self.inner.lock().current)
    }

    pub fn initial_links(&self) -> Vec<EntityRef> {
        links(&self.inner.lock().initial)
    }

    /// Current `(target, link)` pairs
    pub fn linked(&self) -> Vec<LinkedEntity> {
        self.inner.lock().current.clone()
    }

    /// Current targets, loading them first if the attribute is untouched.
    ///
    /// Concurrent callers share one in-flight load. An owner without an
    /// identifier cannot have link rows yet, so the attribute is marked
    /// loaded and empty without touching storage.
    pub async fn get(
        &self,
        owner: Option<&EntityId>,
        loader: &LinkedEntitiesLoader,
    ) -> Result<Vec<EntityRef>, RelationLoadError> {
        let (generation, pending) = {
            let mut inner = self.inner.lock();
            let in_flight = match &inner.phase {
                Phase::Loaded | Phase::Assigned => return Ok(targets(&inner.current)),
                Phase::Loading(pending) => Some(pending.clone()),
                Phase::Empty => None,
            };

            match in_flight {
                Some(pending) => (inner.generation, pending),
                None => {
                    let Some(owner) = owner else {
                        inner.phase = Phase::Loaded;
                        return Ok(targets(&inner.current));
                    };

                    tracing::debug!(
                        "Loading relation '{}' for owner {}",
                        self.descriptor.name,
                        owner
                    );
                    let pending = loader.clone().load_owned(owner.clone()).shared();
                    inner.generation += 1;
                    inner.phase = Phase::Loading(pending.clone());
                    (inner.generation, pending)
                }
            }
        };

        let result = pending.await;

        let mut inner = self.inner.lock();
        let in_flight = inner.generation == generation && matches!(inner.phase, Phase::Loading(_));
        match result {
            Ok(linked) => {
                if in_flight {
                    inner.initial = linked.clone();
                    inner.current = linked;
                    inner.phase = Phase::Loaded;
                } else if inner.generation != generation {
                    tracing::warn!(
                        "Discarding stale load of relation '{}': replaced while loading",
                        self.descriptor.name
                    );
                }
                Ok(targets(&inner.current))
            }
            Err(err) => {
                if in_flight {
                    inner.phase = Phase::Empty;
                    return Err(err);
                }
                match inner.phase {
                    // replaced while loading: the assignment stands
                    Phase::Assigned | Phase::Loaded if inner.generation != generation => {
                        tracing::warn!(
                            "Ignoring failed stale load of relation '{}': {}",
                            self.descriptor.name,
                            err
                        );
                        Ok(targets(&inner.current))
                    }
                    _ => Err(err),
                }
            }
        }
    }

    /// Discard in-memory state and load again from storage
    pub async fn reload(
        &self,
        owner: Option<&EntityId>,
        loader: &LinkedEntitiesLoader,
    ) -> Result<Vec<EntityRef>, RelationLoadError> {
        self.reset();
        self.get(owner, loader).await
    }

    /// Back to the untouched state; an in-flight load becomes stale
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.generation += 1;
        inner.phase = Phase::Empty;
        inner.initial.clear();
        inner.current.clear();
    }

    /// Replace the relation's contents without loading.
    ///
    /// A member that is already present (in `current` or `initial`) keeps its
    /// link row; every other member gets a placeholder link row that is
    /// written on the next save.
    pub fn set<I, T>(&self, owner: Option<&EntityId>, members: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<RelatedInput>,
    {
        let mut inner = self.inner.lock();
        let mut claimed: Vec<EntityRef> = Vec::new();
        let mut next = Vec::new();

        for member in members {
            let (target, by_id) = match member.into() {
                RelatedInput::Entity(entity) => (entity, false),
                RelatedInput::Data(row) => {
                    let target_type = self.descriptor.target_type.clone();
                    (EntityRef::from_row(target_type, row), false)
                }
                RelatedInput::Id(id) => {
                    let mut record = Record::new(self.descriptor.target_type.clone());
                    record.set_id(id);
                    (EntityRef::new(record), true)
                }
            };

            let existing = inner
                .current
                .iter()
                .chain(inner.initial.iter())
                .find(|pair| {
                    pair.target.same_entity(&target)
                        && !claimed.iter().any(|link| link.ptr_eq(&pair.link))
                })
                .cloned();

            let pair = match existing {
                Some(existing) => LinkedEntity {
                    target: if by_id { existing.target } else { target },
                    link: existing.link,
                },
                None => {
                    let link = self.descriptor.placeholder_link(owner, target.id().as_ref());
                    LinkedEntity {
                        target,
                        link: EntityRef::new(link),
                    }
                }
            };
            claimed.push(pair.link.clone());
            next.push(pair);
        }

        inner.current = next;
        inner.generation += 1;
        inner.phase = Phase::Assigned;
    }

    /// Snapshots to reconcile, or `None` when there is nothing to persist
    pub(crate) fn pending_changes(&self) -> Option<PendingChanges> {
        let inner = self.inner.lock();
        match inner.phase {
            Phase::Empty | Phase::Loading(_) => None,
            Phase::Loaded | Phase::Assigned => Some(PendingChanges {
                generation: inner.generation,
                initial: inner.initial.clone(),
                current: inner.current.clone(),
            }),
        }
    }

    /// Make the persisted snapshot the new steady state
    pub(crate) fn promote(&self, generation: u64, persisted: Vec<LinkedEntity>) {
        let mut inner = self.inner.lock();
        inner.initial = persisted;
        if inner.generation == generation {
            inner.current = inner.initial.clone();
            inner.phase = Phase::Loaded;
        }
    }
}

fn targets(pairs: &[LinkedEntity]) -> Vec<EntityRef> {
    pairs.iter().map(|pair| pair.target.clone()).collect()
}

fn links(pairs: &[LinkedEntity]) -> Vec<EntityRef> {
    pairs.iter().map(|pair| pair.link.clone()).collect()
}

impl std::fmt::Debug for RelationAttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("RelationAttributeValue")
            .field("name", &self.descriptor.name)
            .field("generation", &inner.generation)
            .field("initial", &inner.initial.len())
            .field("current", &inner.current.len())
            .finish()
    }
}
