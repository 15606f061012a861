//! Result store port (driven/secondary port)
//!
//! The local cache the adaptors write into. The store owns its schema and
//! serializes concurrent writers itself; the engine issues at most one
//! `commit` per account per pass and never writes after it.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific;
//!   the engine classifies any read failure as "cache unavailable".
//! - Uses `#[async_trait]` for async trait methods.

use chrono::{DateTime, Utc};

use crate::domain::{CacheRecord, ChangeSet, DataType, Provider, StoreScope};

/// Port trait for the per-datatype result store
#[async_trait::async_trait]
pub trait IResultStore: Send + Sync {
    /// Prepares the store for use (schema, handles)
    ///
    /// A failure here leaves the adaptor in the `Invalid` status.
    async fn initialize(&self) -> anyhow::Result<()>;

    /// Returns every cached record for the scope
    ///
    /// Used to build the removal-detection snapshot at the start of a pass.
    async fn query(&self, scope: &StoreScope) -> anyhow::Result<Vec<CacheRecord>>;

    /// Applies all upserts and removals of one pass as one logical transaction
    ///
    /// # Arguments
    /// * `scope` - Provider, data type and account the changes belong to
    /// * `changes` - Records to add or replace, and keys to delete
    async fn commit(&self, scope: &StoreScope, changes: ChangeSet) -> anyhow::Result<()>;

    /// Deletes every record and the last-sync timestamp of the scope
    ///
    /// # Returns
    /// Number of records removed; zero when the account was never synced
    async fn purge_account(&self, scope: &StoreScope) -> anyhow::Result<u64>;

    /// Deletes entity records whose container is no longer known for the account
    ///
    /// # Returns
    /// Number of orphaned records removed
    async fn remove_orphans(&self, provider: Provider, data_type: DataType)
        -> anyhow::Result<u64>;

    /// Time window start of the last successful pass, if any
    async fn last_sync_timestamp(
        &self,
        scope: &StoreScope,
    ) -> anyhow::Result<Option<DateTime<Utc>>>;

    /// Records the start time of a successful, committed pass
    async fn set_last_sync_timestamp(
        &self,
        scope: &StoreScope,
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<()>;

    /// Flushes and releases held storage handles
    async fn flush(&self) -> anyhow::Result<()>;
}
