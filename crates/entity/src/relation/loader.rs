//! Linked Entities Loader - resolves a relation through its link table
//!
//! A load is two steps: enumerate the owner's link rows, then look up the
//! target of each row. Target N of the result always belongs to link row N,
//! whether lookups run one at a time or concurrently. Any failure discards
//! the whole load.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};

use super::descriptor::RelationDescriptor;
use super::value::LinkedEntity;
use crate::config::TargetResolution;
use crate::driver::{Driver, DriverRegistry};
use crate::entity::{EntityId, EntityRef};
use crate::error::RelationLoadError;
use crate::query::{Query, Row};

/// Outcome of a relation load
pub type LoadResult = Result<Vec<LinkedEntity>, RelationLoadError>;

/// Fetches link rows for an owner and resolves each one to its target
#[derive(Clone)]
pub struct LinkedEntitiesLoader {
    descriptor: Arc<RelationDescriptor>,
    drivers: Arc<DriverRegistry>,
    resolution: TargetResolution,
}

impl LinkedEntitiesLoader {
    pub fn new(
        descriptor: Arc<RelationDescriptor>,
        drivers: Arc<DriverRegistry>,
        resolution: TargetResolution,
    ) -> Self {
        Self {
            descriptor,
            drivers,
            resolution,
        }
    }

    pub fn descriptor(&self) -> &RelationDescriptor {
        &self.descriptor
    }

    /// Load the relation for `owner`
    pub async fn load(&self, owner: &EntityId) -> LoadResult {
        let link_rows = self.fetch_link_rows(owner).await?;

        let mut pending = Vec::with_capacity(link_rows.len());
        for row in link_rows {
            let target = self.descriptor.target_ref(&row).ok_or_else(|| {
                RelationLoadError::MalformedLinkRow {
                    relation: self.descriptor.name.clone(),
                    owner: owner.clone(),
                    link: row
                        .get("id")
                        .and_then(EntityId::from_json)
                        .map_or_else(|| "<unsaved>".to_string(), |id| id.to_string()),
                    field: self.descriptor.target_field.clone(),
                }
            })?;
            pending.push((row, target));
        }

        let Some((_, first_target)) = pending.first() else {
            return Ok(Vec::new());
        };
        let target_driver = self
            .drivers
            .driver_for(&self.descriptor.target_type)
            .map_err(|source| RelationLoadError::Target {
                relation: self.descriptor.name.clone(),
                owner: owner.clone(),
                target: first_target.clone(),
                source,
            })?;

        let resolved: Vec<Option<LinkedEntity>> = match self.resolution {
            TargetResolution::Sequential => {
                let mut resolved = Vec::with_capacity(pending.len());
                for (row, target) in pending {
                    resolved.push(self.resolve(target_driver.as_ref(), owner, row, target).await?);
                }
                resolved
            }
            TargetResolution::Concurrent { limit } => {
                stream::iter(pending)
                    .map(|(row, target)| self.resolve(target_driver.as_ref(), owner, row, target))
                    .buffered(limit.max(1))
                    .try_collect()
                    .await?
            }
        };

        let linked: Vec<LinkedEntity> = resolved.into_iter().flatten().collect();
        tracing::debug!(
            "Loaded {} linked entities for {}.{} (owner {})",
            linked.len(),
            self.descriptor.link_type,
            self.descriptor.name,
            owner
        );
        Ok(linked)
    }

    /// Owned, boxed load suitable for sharing between waiters
    pub fn load_owned(self, owner: EntityId) -> BoxFuture<'static, LoadResult> {
        async move { self.load(&owner).await }.boxed()
    }

    /// Only the owner's link rows, without resolving targets
    pub async fn load_links(&self, owner: &EntityId) -> Result<Vec<EntityRef>, RelationLoadError> {
        let rows = self.fetch_link_rows(owner).await?;
        Ok(rows
            .into_iter()
            .map(|row| EntityRef::from_row(self.descriptor.link_type.clone(), row))
            .collect())
    }

    async fn fetch_link_rows(&self, owner: &EntityId) -> Result<Vec<Row>, RelationLoadError> {
        let link_error = |source| RelationLoadError::LinkRows {
            relation: self.descriptor.name.clone(),
            owner: owner.clone(),
            source,
        };

        let driver = self
            .drivers
            .driver_for(&self.descriptor.link_type)
            .map_err(link_error)?;
        let result = driver
            .find(&self.descriptor.link_type, &self.descriptor.link_query(owner))
            .await
            .map_err(link_error)?;

        Ok(result.into_rows())
    }

    async fn resolve(
        &self,
        driver: &dyn Driver,
        owner: &EntityId,
        link_row: Row,
        target: EntityId,
    ) -> Result<Option<LinkedEntity>, RelationLoadError> {
        let found = driver
            .find_one(&self.descriptor.target_type, &Query::by_id(&target))
            .await
            .map_err(|source| RelationLoadError::Target {
                relation: self.descriptor.name.clone(),
                owner: owner.clone(),
                target: target.clone(),
                source,
            })?;

        match found.into_first() {
            Some(row) => Ok(Some(LinkedEntity {
                target: EntityRef::from_row(self.descriptor.target_type.clone(), row),
                link: EntityRef::from_row(self.descriptor.link_type.clone(), link_row),
            })),
            None => {
                tracing::warn!(
                    "Skipping dangling link row of '{}': {} {} not found",
                    self.descriptor.name,
                    self.descriptor.target_type,
                    target
                );
                Ok(None)
            }
        }
    }
}
