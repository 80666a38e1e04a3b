//! Save Orchestrator - persists the delta between a relation's snapshots
//!
//! Ordering per pass: the owner first, then every added target followed by
//! its link row, then deletion of removed link rows. Targets are never
//! deleted; removing a member only severs the link. A failed step aborts the
//! pass and leaves the initial snapshot untouched, so a retry recomputes the
//! same delta.

use std::fmt;

use super::value::{LinkedEntity, RelationAttributeValue};
use crate::driver::DriverRegistry;
use crate::entity::{EntityId, EntityRef, Record};
use crate::error::{DriverError, RelationSaveError, SavePhase};

/// Driver traffic issued by one relation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    pub targets_saved: usize,
    pub links_saved: usize,
    pub links_deleted: usize,
}

impl SaveSummary {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for SaveSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} targets saved, {} links saved, {} links deleted",
            self.targets_saved, self.links_saved, self.links_deleted
        )
    }
}

/// Issues the driver calls that bring storage in line with a relation
pub struct SaveOrchestrator<'a> {
    drivers: &'a DriverRegistry,
}

impl<'a> SaveOrchestrator<'a> {
    pub fn new(drivers: &'a DriverRegistry) -> Self {
        Self { drivers }
    }

    /// Save the owner record; its identifier must exist before any link row
    /// can reference it
    pub async fn save_owner(&self, owner: &mut Record) -> Result<EntityId, RelationSaveError> {
        let owner_error = |source| RelationSaveError::new(None, SavePhase::Owner, source);

        let driver = self.drivers.driver_for(owner.entity_type()).map_err(owner_error)?;
        driver.save(owner).await.map_err(owner_error)?;

        owner.id().cloned().ok_or_else(|| {
            owner_error(DriverError::backend(
                owner.entity_type().name(),
                "save did not assign an identifier",
            ))
        })
    }

    /// Persist additions and removals of one relation for a saved owner
    pub async fn persist(
        &self,
        owner: &EntityId,
        relation: &RelationAttributeValue,
    ) -> Result<SaveSummary, RelationSaveError> {
        let Some(changes) = relation.pending_changes() else {
            return Ok(SaveSummary::default());
        };

        let descriptor = relation.descriptor();
        let name = Some(descriptor.name.as_str());
        let mut summary = SaveSummary::default();

        let additions = changes
            .current
            .iter()
            .filter(|pair| !changes.initial.iter().any(|old| old.link.ptr_eq(&pair.link)));

        for pair in additions {
            let target = match pair.target.id() {
                Some(id) => id,
                None => {
                    let id = self.save_handle(&pair.target, name, SavePhase::Target).await?;
                    summary.targets_saved += 1;
                    id
                }
            };

            let mut link = pair.link.snapshot();
            descriptor.bind_link(&mut link, owner, &target);
            pair.link.replace(link);
            self.save_handle(&pair.link, name, SavePhase::Link).await?;
            summary.links_saved += 1;
        }

        let removals = changes
            .initial
            .iter()
            .filter(|old| !changes.current.iter().any(|pair| pair.link.ptr_eq(&old.link)));

        for removed in removals {
            if removed.link.id().is_none() {
                continue;
            }
            self.delete_link(removed, name).await?;
            summary.links_deleted += 1;
        }

        relation.promote(changes.generation, changes.current);

        tracing::debug!("Persisted relation '{}' of owner {}: {}", descriptor.name, owner, summary);
        Ok(summary)
    }

    /// Delete the given link rows, in order
    pub async fn unlink_all(
        &self,
        relation: &str,
        link_rows: &[EntityRef],
    ) -> Result<usize, RelationSaveError> {
        let fail = |source| RelationSaveError::new(Some(relation), SavePhase::Unlink, source);

        let mut deleted = 0;
        for link in link_rows.iter().filter(|link| link.id().is_some()) {
            let record = link.snapshot();
            let driver = self.drivers.driver_for(record.entity_type()).map_err(fail)?;
            driver.delete(&record).await.map_err(fail)?;
            deleted += 1;
        }
        Ok(deleted)
    }

    /// Save a shared record through its type's driver and write the result
    /// back into the handle
    async fn save_handle(
        &self,
        handle: &EntityRef,
        relation: Option<&str>,
        phase: SavePhase,
    ) -> Result<EntityId, RelationSaveError> {
        let mut record = handle.snapshot();
        let fail = |source| RelationSaveError::new(relation, phase, source);

        let driver = self.drivers.driver_for(record.entity_type()).map_err(fail)?;
        if let Err(source) = driver.save(&mut record).await {
            tracing::error!("{} failed for {}: {}", phase, record.entity_type(), source);
            return Err(fail(source));
        }

        let id = record.id().cloned().ok_or_else(|| {
            fail(DriverError::backend(
                record.entity_type().name(),
                "save did not assign an identifier",
            ))
        })?;
        handle.replace(record);
        Ok(id)
    }

    async fn delete_link(
        &self,
        removed: &LinkedEntity,
        relation: Option<&str>,
    ) -> Result<(), RelationSaveError> {
        let record = removed.link.snapshot();
        let fail = |source| RelationSaveError::new(relation, SavePhase::Unlink, source);

        let driver = self.drivers.driver_for(record.entity_type()).map_err(fail)?;
        driver.delete(&record).await.map_err(|source| {
            tracing::error!(
                "{} failed for {}: {}",
                SavePhase::Unlink,
                record.entity_type(),
                source
            );
            fail(source)
        })?;
        Ok(())
    }
}
