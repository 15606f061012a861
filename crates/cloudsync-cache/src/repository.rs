//! SQLite implementation of IResultStore
//!
//! ## Type Mapping
//!
//! | Domain Type              | SQL Type | Strategy                                  |
//! |--------------------------|----------|-------------------------------------------|
//! | Provider, DataType       | TEXT     | stable lowercase name via `as_str()`      |
//! | AccountId                | INTEGER  | `get()` / `AccountId::new()`              |
//! | ContainerId, EntityId    | TEXT     | `as_str()` / validated `new()`            |
//! | payload (`Value`)        | TEXT     | serde_json serialization                  |
//! | DateTime<Utc>            | TEXT     | RFC 3339 via `to_rfc3339()`               |

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use cloudsync_core::domain::{
    CacheRecord, ChangeSet, ContainerId, DataType, EntityId, Provider, StoreScope,
};
use cloudsync_core::ports::IResultStore;

use crate::pool;
use crate::CacheError;

/// SQLite-backed result store shared by every adaptor of a process
///
/// Adaptors for different providers or data types write disjoint rows, so
/// one store (and one pool) can serve all of them.
#[derive(Clone)]
pub struct SqliteResultStore {
    pool: SqlitePool,
}

impl SqliteResultStore {
    /// Creates a store on top of the given connection pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

// ============================================================================
// Helper functions for type conversion
// ============================================================================

fn account_param(scope: &StoreScope) -> i64 {
    i64::from(scope.account.get())
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, CacheError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CacheError::CorruptRow(format!("Failed to parse datetime '{}': {}", s, e)))
}

/// Rebuilds a CacheRecord from a `cache_records` row
fn record_from_row(row: &SqliteRow) -> Result<CacheRecord, CacheError> {
    let container: String = row.get("container_id");
    let entity: String = row.get("entity_id");
    let version: Option<String> = row.get("version");
    let payload: String = row.get("payload");
    let updated_at: String = row.get("updated_at");

    let container =
        ContainerId::new(container).map_err(|e| CacheError::CorruptRow(e.to_string()))?;
    let entity = EntityId::new(entity).map_err(|e| CacheError::CorruptRow(e.to_string()))?;
    let payload = serde_json::from_str(&payload)
        .map_err(|e| CacheError::CorruptRow(format!("Invalid payload JSON: {}", e)))?;

    Ok(CacheRecord {
        container,
        entity,
        version,
        payload,
        updated_at: parse_datetime(&updated_at)?,
    })
}

// ============================================================================
// IResultStore implementation
// ============================================================================

#[async_trait::async_trait]
impl IResultStore for SqliteResultStore {
    async fn initialize(&self) -> anyhow::Result<()> {
        pool::migrate(&self.pool).await?;
        Ok(())
    }

    async fn query(&self, scope: &StoreScope) -> anyhow::Result<Vec<CacheRecord>> {
        let rows = sqlx::query(
            "SELECT container_id, entity_id, version, payload, updated_at \
             FROM cache_records \
             WHERE provider = ? AND data_type = ? AND account_id = ? \
             ORDER BY container_id, entity_id",
        )
        .bind(scope.provider.as_str())
        .bind(scope.data_type.as_str())
        .bind(account_param(scope))
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(record_from_row(row)?);
        }
        Ok(records)
    }

    async fn commit(&self, scope: &StoreScope, changes: ChangeSet) -> anyhow::Result<()> {
        if changes.is_empty() {
            tracing::trace!(%scope, "Nothing to commit");
            return Ok(());
        }

        let provider = scope.provider.as_str();
        let data_type = scope.data_type.as_str();
        let account = account_param(scope);

        let mut tx = self.pool.begin().await?;

        for record in &changes.upserts {
            let payload = serde_json::to_string(&record.payload)
                .map_err(|e| anyhow::anyhow!("Failed to serialize payload: {}", e))?;
            sqlx::query(
                "INSERT OR REPLACE INTO cache_records \
                 (provider, data_type, account_id, container_id, entity_id, \
                  version, payload, updated_at) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(provider)
            .bind(data_type)
            .bind(account)
            .bind(record.container.as_str())
            .bind(record.entity.as_str())
            .bind(&record.version)
            .bind(&payload)
            .bind(record.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        for (container, entity) in &changes.removals {
            sqlx::query(
                "DELETE FROM cache_records \
                 WHERE provider = ? AND data_type = ? AND account_id = ? \
                 AND container_id = ? AND entity_id = ?",
            )
            .bind(provider)
            .bind(data_type)
            .bind(account)
            .bind(container.as_str())
            .bind(entity.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(
            %scope,
            upserts = changes.upserts.len(),
            removals = changes.removals.len(),
            "Committed change set"
        );
        Ok(())
    }

    async fn purge_account(&self, scope: &StoreScope) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query(
            "DELETE FROM cache_records \
             WHERE provider = ? AND data_type = ? AND account_id = ?",
        )
        .bind(scope.provider.as_str())
        .bind(scope.data_type.as_str())
        .bind(account_param(scope))
        .execute(&mut *tx)
        .await?
        .rows_affected();

        sqlx::query(
            "DELETE FROM sync_timestamps \
             WHERE provider = ? AND data_type = ? AND account_id = ?",
        )
        .bind(scope.provider.as_str())
        .bind(scope.data_type.as_str())
        .bind(account_param(scope))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(%scope, removed, "Purged account records");
        Ok(removed)
    }

    async fn remove_orphans(&self, provider: Provider, data_type: DataType) -> anyhow::Result<u64> {
        let removed = sqlx::query(
            "DELETE FROM cache_records \
             WHERE provider = ? AND data_type = ? AND container_id <> ? \
             AND NOT EXISTS ( \
                 SELECT 1 FROM cache_records AS parent \
                 WHERE parent.provider = cache_records.provider \
                 AND parent.data_type = cache_records.data_type \
                 AND parent.account_id = cache_records.account_id \
                 AND parent.container_id = ? \
                 AND parent.entity_id = cache_records.container_id)",
        )
        .bind(provider.as_str())
        .bind(data_type.as_str())
        .bind(ContainerId::ROOT)
        .bind(ContainerId::ROOT)
        .execute(&self.pool)
        .await?
        .rows_affected();

        tracing::debug!(%provider, %data_type, removed, "Swept orphaned records");
        Ok(removed)
    }

    async fn last_sync_timestamp(
        &self,
        scope: &StoreScope,
    ) -> anyhow::Result<Option<DateTime<Utc>>> {
        let value: Option<String> = sqlx::query_scalar(
            "SELECT synced_at FROM sync_timestamps \
             WHERE provider = ? AND data_type = ? AND account_id = ?",
        )
        .bind(scope.provider.as_str())
        .bind(scope.data_type.as_str())
        .bind(account_param(scope))
        .fetch_optional(&self.pool)
        .await?;

        match value {
            Some(ref s) => Ok(Some(parse_datetime(s)?)),
            None => Ok(None),
        }
    }

    async fn set_last_sync_timestamp(
        &self,
        scope: &StoreScope,
        timestamp: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT OR REPLACE INTO sync_timestamps \
             (provider, data_type, account_id, synced_at) VALUES (?, ?, ?, ?)",
        )
        .bind(scope.provider.as_str())
        .bind(scope.data_type.as_str())
        .bind(account_param(scope))
        .bind(timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::trace!(%scope, %timestamp, "Stored last sync timestamp");
        Ok(())
    }

    async fn flush(&self) -> anyhow::Result<()> {
        sqlx::raw_sql("PRAGMA wal_checkpoint(TRUNCATE);")
            .execute(&self.pool)
            .await?;
        tracing::debug!("Cache flushed");
        Ok(())
    }
}
