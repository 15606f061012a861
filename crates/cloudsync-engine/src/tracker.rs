//! Per-account busy tracker
//!
//! Counts outstanding asynchronous operations per account. Increments happen
//! before the guarded operation is dispatched; the decrement that brings an
//! account back to zero is reported as [`Crossing::ReachedZero`] so the caller
//! runs finalize exactly once for that crossing.
//!
//! An account keeps a zero entry after its crossing until it is forgotten,
//! so finalize may legitimately raise the count again.

use std::collections::HashMap;

use cloudsync_core::domain::AccountId;

use crate::SyncError;

/// Result of a successful decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// Operations remain outstanding
    StillBusy,
    /// This decrement brought the count to zero
    ReachedZero,
}

/// Outstanding-operation counts keyed by account
#[derive(Debug, Default)]
pub struct BusyTracker {
    counts: HashMap<AccountId, u32>,
}

impl BusyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increases the account's count by one and returns the new count
    pub fn increment(&mut self, account: AccountId) -> u32 {
        let count = self.counts.entry(account).or_insert(0);
        *count += 1;
        *count
    }

    /// Decreases the account's count by one
    ///
    /// # Errors
    /// `InvariantViolation` when the account is not tracked or is already at zero.
    /// The tracked count is left unchanged in that case.
    pub fn decrement(&mut self, account: AccountId) -> Result<Crossing, SyncError> {
        let Some(count) = self.counts.get_mut(&account) else {
            return Err(SyncError::InvariantViolation {
                account,
                detail: "decrement without a tracked entry".to_string(),
            });
        };
        if *count == 0 {
            return Err(SyncError::InvariantViolation {
                account,
                detail: "decrement below zero".to_string(),
            });
        }
        *count -= 1;
        if *count == 0 {
            Ok(Crossing::ReachedZero)
        } else {
            Ok(Crossing::StillBusy)
        }
    }

    /// Current count; zero for untracked accounts
    pub fn count(&self, account: AccountId) -> u32 {
        self.counts.get(&account).copied().unwrap_or(0)
    }

    /// Stops tracking the account, returning its last count
    pub fn forget(&mut self, account: AccountId) -> Option<u32> {
        self.counts.remove(&account)
    }

    /// True when every tracked account is at zero
    pub fn is_idle(&self) -> bool {
        self.counts.values().all(|c| *c == 0)
    }
}
