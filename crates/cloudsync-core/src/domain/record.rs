//! Cache records and per-pass change sets
//!
//! The store owns the persisted shape of these records; the engine only
//! builds them from server responses and hands them over in one
//! [`ChangeSet`] per account per pass.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::{AccountId, ContainerId, DataType, EntityId, Provider};

/// Partition key for records and timestamps in the result store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StoreScope {
    pub provider: Provider,
    pub data_type: DataType,
    pub account: AccountId,
}

impl StoreScope {
    #[must_use]
    pub const fn new(provider: Provider, data_type: DataType, account: AccountId) -> Self {
        Self {
            provider,
            data_type,
            account,
        }
    }
}

impl std::fmt::Display for StoreScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.provider, self.data_type, self.account)
    }
}

/// One cached remote entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Container the entity was listed under
    pub container: ContainerId,
    /// Remote identifier of the entity
    pub entity: EntityId,
    /// Provider change marker (eTag, `updated_time`, `rev`)
    pub version: Option<String>,
    /// Provider fields kept verbatim
    pub payload: serde_json::Value,
    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl CacheRecord {
    /// Create a record stamped with the current time
    pub fn new(
        container: ContainerId,
        entity: EntityId,
        version: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            container,
            entity,
            version,
            payload,
            updated_at: Utc::now(),
        }
    }

    /// Composite key of the record inside its scope
    #[must_use]
    pub fn key(&self) -> (&ContainerId, &EntityId) {
        (&self.container, &self.entity)
    }
}

/// All writes for one account in one pass, committed atomically
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Records to add or replace
    pub upserts: Vec<CacheRecord>,
    /// Records to delete
    pub removals: Vec<(ContainerId, EntityId)>,
}

impl ChangeSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removals.is_empty()
    }
}
