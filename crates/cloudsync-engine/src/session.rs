//! Per-account sync session
//!
//! One [`AccountSession`] exists per account while its pass runs. It is
//! created when the pass begins for the account and dropped when the
//! account retires after finalize, so no per-account state outlives a pass.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use cloudsync_core::domain::{AccountId, CacheRecord, ContainerId, EntityId};

use crate::removal::RemovalState;
use crate::SyncError;

/// Counters reported in the pass summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub requests_completed: u64,
    pub requests_failed: u64,
    pub records_written: u64,
    pub records_removed: u64,
}

impl SessionStats {
    pub fn absorb(&mut self, other: &SessionStats) {
        self.requests_completed += other.requests_completed;
        self.requests_failed += other.requests_failed;
        self.records_written += other.records_written;
        self.records_removed += other.records_removed;
    }
}

/// State of one account's sync pass
#[derive(Debug)]
pub struct AccountSession {
    pub account: AccountId,
    /// Credential supplied at begin; never persisted
    pub access_token: String,
    /// Pass start; becomes the last-sync timestamp on success
    pub started_at: DateTime<Utc>,
    /// Last-sync timestamp read at begin
    pub since: Option<DateTime<Utc>>,
    pub removal: RemovalState,
    /// Whether initial requests were issued (store and credentials were available)
    pub begun: bool,
    /// Set once any branch of this pass failed
    pub failed: bool,
    /// Set by an abort; no further follow-ups are dispatched
    pub aborted: bool,
    /// Post-pass requests are asked for at most once
    pub post_pass_requested: bool,
    pub stats: SessionStats,
    errors: Vec<SyncError>,
    pending: BTreeMap<(ContainerId, EntityId), CacheRecord>,
}

impl AccountSession {
    pub fn new(account: AccountId) -> Self {
        Self {
            account,
            access_token: String::new(),
            started_at: Utc::now(),
            since: None,
            removal: RemovalState::new(),
            begun: false,
            failed: false,
            aborted: false,
            post_pass_requested: false,
            stats: SessionStats::default(),
            errors: Vec::new(),
            pending: BTreeMap::new(),
        }
    }

    /// Records a failure; the pass continues for sibling branches
    pub fn fail(&mut self, error: SyncError) {
        self.failed = true;
        self.errors.push(error);
    }

    /// Failures of this pass joined for logging; empty when none
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Queues a record for the commit, replacing any earlier write of the same key
    pub fn stage(&mut self, record: CacheRecord) {
        self.pending
            .insert((record.container.clone(), record.entity.clone()), record);
    }

    pub fn is_staged(&self, container: &ContainerId, entity: &EntityId) -> bool {
        self.pending
            .contains_key(&(container.clone(), entity.clone()))
    }

    /// Records written during this pass, in key order
    pub fn staged(&self) -> Vec<CacheRecord> {
        self.pending.values().cloned().collect()
    }

    /// Takes the staged records for the commit
    pub fn take_staged(&mut self) -> Vec<CacheRecord> {
        std::mem::take(&mut self.pending).into_values().collect()
    }
}
