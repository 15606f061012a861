//! Removal-detection snapshot
//!
//! Built from the store at the start of a pass: which entities each
//! container held locally, with their versions. During the pass every
//! entity seen in a response is recorded as observed, and a container is
//! marked complete when the last page of its listing arrives.
//!
//! Removals for a container are only ever computed from a complete
//! listing. A container whose listing never finished is left untouched.

use std::collections::{BTreeMap, BTreeSet};

use cloudsync_core::domain::{CacheRecord, ContainerId, EntityId};
use thiserror::Error;

/// Raised when removals are requested for a container whose listing is incomplete
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Listing of container {0} is not complete")]
pub struct IncompleteListing(pub ContainerId);

/// Cached vs observed entity ids for one account's pass
#[derive(Debug, Clone, Default)]
pub struct RemovalState {
    cached: BTreeMap<ContainerId, BTreeMap<EntityId, Option<String>>>,
    observed: BTreeMap<ContainerId, BTreeSet<EntityId>>,
    completed: BTreeSet<ContainerId>,
}

impl RemovalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records cached before the pass began
    pub fn from_records(records: &[CacheRecord]) -> Self {
        let mut state = Self::new();
        for record in records {
            state
                .cached
                .entry(record.container.clone())
                .or_default()
                .insert(record.entity.clone(), record.version.clone());
        }
        state
    }

    /// Records an entity seen in a server response
    ///
    /// Returns `true` the first time the entity is seen in this pass.
    pub fn record_observed(&mut self, container: &ContainerId, entity: &EntityId) -> bool {
        self.observed
            .entry(container.clone())
            .or_default()
            .insert(entity.clone())
    }

    /// Whether the entity needs writing: absent from the cache, or its version moved
    ///
    /// An entity without a version marker is always considered changed.
    pub fn is_changed(
        &self,
        container: &ContainerId,
        entity: &EntityId,
        version: Option<&str>,
    ) -> bool {
        match (self.cached_version(container, entity), version) {
            (Some(Some(cached)), Some(seen)) => cached != seen,
            _ => true,
        }
    }

    /// Cached version of an entity; `None` when not cached
    pub fn cached_version(
        &self,
        container: &ContainerId,
        entity: &EntityId,
    ) -> Option<Option<&str>> {
        self.cached
            .get(container)
            .and_then(|entities| entities.get(entity))
            .map(|v| v.as_deref())
    }

    /// Marks the container's listing as having reached its last page
    pub fn mark_complete(&mut self, container: &ContainerId) {
        self.completed.insert(container.clone());
    }

    pub fn is_complete(&self, container: &ContainerId) -> bool {
        self.completed.contains(container)
    }

    /// Number of distinct entities observed in the container this pass
    pub fn observed_count(&self, container: &ContainerId) -> usize {
        self.observed.get(container).map_or(0, BTreeSet::len)
    }

    /// Entities cached for the container but not observed this pass
    ///
    /// # Errors
    /// [`IncompleteListing`] if the container's last page has not arrived.
    pub fn compute_removals(
        &self,
        container: &ContainerId,
    ) -> Result<BTreeSet<EntityId>, IncompleteListing> {
        if !self.is_complete(container) {
            return Err(IncompleteListing(container.clone()));
        }
        let Some(cached) = self.cached.get(container) else {
            return Ok(BTreeSet::new());
        };
        let observed = self.observed.get(container);
        Ok(cached
            .keys()
            .filter(|e| !observed.is_some_and(|seen| seen.contains(*e)))
            .cloned()
            .collect())
    }

    /// All deletions to apply at finalize
    ///
    /// - A complete container contributes `cached - observed`.
    /// - When the root listing is complete, a cached container missing from it
    ///   is removed together with every entity cached under it.
    /// - When `pass_errored`, containers with nothing observed are skipped.
    /// - Incomplete containers are skipped.
    pub fn scheduled_removals(&self, pass_errored: bool) -> Vec<(ContainerId, EntityId)> {
        let root = ContainerId::root();
        let skip_empty = |c: &ContainerId| pass_errored && self.observed_count(c) == 0;

        let root_authoritative = self.is_complete(&root) && !skip_empty(&root);

        let mut removals = Vec::new();
        for (container, entities) in &self.cached {
            let whole_container_gone = !container.is_root()
                && root_authoritative
                && !self.was_listed_under_root(container);
            if whole_container_gone {
                removals.extend(entities.keys().map(|e| (container.clone(), e.clone())));
                continue;
            }
            if skip_empty(container) {
                continue;
            }
            if let Ok(gone) = self.compute_removals(container) {
                removals.extend(gone.into_iter().map(|e| (container.clone(), e)));
            }
        }
        removals
    }

    fn was_listed_under_root(&self, container: &ContainerId) -> bool {
        self.observed
            .get(&ContainerId::root())
            .is_some_and(|seen| seen.contains(&EntityId::from(container)))
    }
}
