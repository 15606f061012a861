//! Purge and cleanup path
//!
//! Removes every cached record attributable to one account. A live pass
//! for the account is cancelled without committing, and outcomes of its
//! outstanding requests are dropped when they arrive. Other accounts are
//! never touched, even when they share the provider.
//!
//! `CleanUpPurge` is used when the adaptor is being torn down: it also
//! sweeps orphaned records and flushes the store. Purging an account with
//! nothing cached is a no-op that reports zero removals.

use cloudsync_core::domain::{AccountId, PurgeMode};
use tracing::info;

use crate::adaptor::SyncAdaptor;
use crate::SyncError;

impl SyncAdaptor {
    /// Purges an account's cached data
    ///
    /// # Returns
    /// Records removed for the account, plus orphans swept in `CleanUpPurge`
    #[tracing::instrument(skip(self), fields(provider = %self.provider(), data_type = %self.data_type()))]
    pub(crate) async fn purge(
        &mut self,
        account: AccountId,
        mode: PurgeMode,
    ) -> Result<u64, SyncError> {
        if self.drop_account(account) {
            info!(%account, "Cancelled live pass for purged account");
            self.settle_if_idle();
        }

        let scope = self.scope(account);
        let mut removed = self
            .store()
            .purge_account(&scope)
            .await
            .map_err(|e| SyncError::CacheUnavailable(e.to_string()))?;

        if mode == PurgeMode::CleanUpPurge {
            let orphans = self
                .store()
                .remove_orphans(self.provider(), self.data_type())
                .await
                .map_err(|e| SyncError::CacheUnavailable(e.to_string()))?;
            self.store()
                .flush()
                .await
                .map_err(|e| SyncError::CacheUnavailable(e.to_string()))?;
            removed += orphans;
        }

        info!(%account, %mode, removed, "Account data purged");
        Ok(removed)
    }
}
