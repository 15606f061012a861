//! Purge of old accounts

use std::sync::atomic::Ordering;
use std::time::Duration;

use cloudsync_core::domain::{AdaptorStatus, ContainerId, PurgeMode};
use cloudsync_engine::SyncError;
use serde_json::json;

use crate::common::*;

fn seed_two_accounts(store: &MemoryStore) {
    store.seed(1, vec![record("A", "a1", "1"), record("A", "a2", "1")]);
    store.seed(2, vec![record("B", "b1", "1")]);
}

#[tokio::test]
async fn test_purge_removes_only_the_purged_account() {
    let h = Harness::with(ScriptedStrategy::new(vec![])).await;
    seed_two_accounts(&h.store);
    h.store.set_timestamp(1, chrono::Utc::now());

    let removed = h
        .handle
        .purge_data_for_old_account(acct(1), PurgeMode::SyncPurge)
        .await
        .unwrap();

    assert_eq!(removed, 2);
    assert_eq!(h.store.record_count(1), 0);
    assert!(h.store.timestamp(1).is_none());
    assert_eq!(h.store.entities(2, "B"), vec!["b1"]);
}

#[tokio::test]
async fn test_purge_is_idempotent() {
    let h = Harness::with(ScriptedStrategy::new(vec![])).await;
    seed_two_accounts(&h.store);

    h.handle
        .purge_data_for_old_account(acct(1), PurgeMode::SyncPurge)
        .await
        .unwrap();
    let after_first = h.store.snapshot();

    let removed = h
        .handle
        .purge_data_for_old_account(acct(1), PurgeMode::SyncPurge)
        .await
        .unwrap();
    assert_eq!(removed, 0);
    assert_eq!(h.store.snapshot(), after_first);
}

#[tokio::test]
async fn test_purge_of_unknown_account_is_a_no_op() {
    let h = Harness::with(ScriptedStrategy::new(vec![])).await;
    seed_two_accounts(&h.store);

    let removed = h
        .handle
        .purge_data_for_old_account(acct(99), PurgeMode::SyncPurge)
        .await
        .unwrap();
    assert_eq!(removed, 0);
    assert_eq!(h.store.record_count(1), 2);
    assert_eq!(h.handle.status(), AdaptorStatus::Inactive);
}

#[tokio::test]
async fn test_clean_up_purge_sweeps_orphans_and_flushes() {
    let h = Harness::with(ScriptedStrategy::new(vec![])).await;
    h.store.seed(
        1,
        vec![
            record(ContainerId::ROOT, "album", "1"),
            record("album", "p1", "1"),
            record("vanished", "v1", "1"),
        ],
    );
    h.store.seed(2, vec![record("B", "b1", "1")]);

    let removed = h
        .handle
        .purge_data_for_old_account(acct(2), PurgeMode::CleanUpPurge)
        .await
        .unwrap();

    // one record of account 2, plus the orphan of account 1
    assert_eq!(removed, 2);
    assert_eq!(h.store.record_count(2), 0);
    assert_eq!(h.store.entities(1, "album"), vec!["p1"]);
    assert!(h.store.entities(1, "vanished").is_empty());
    assert_eq!(h.store.flushes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_sync_purge_leaves_orphans_alone() {
    let h = Harness::with(ScriptedStrategy::new(vec![])).await;
    h.store.seed(1, vec![record("vanished", "v1", "1")]);
    h.store.seed(2, vec![record("B", "b1", "1")]);

    h.handle
        .purge_data_for_old_account(acct(2), PurgeMode::SyncPurge)
        .await
        .unwrap();

    assert_eq!(h.store.entities(1, "vanished"), vec!["v1"]);
    assert_eq!(h.store.flushes.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_purge_cancels_live_pass_without_commit() {
    let h = Harness::with(ScriptedStrategy::new(vec![Seed::list("A", "mem://A/1")])).await;
    h.store.seed(1, vec![record("A", "a1", "1")]);
    h.transport.page_after(
        "mem://A/1",
        Duration::from_secs(5),
        json!({"records": [{"id": "late", "version": "1"}]}),
    );

    h.handle.sync("images", acct(1)).await.unwrap();
    assert_eq!(h.handle.status(), AdaptorStatus::Busy);

    let removed = h
        .handle
        .purge_data_for_old_account(acct(1), PurgeMode::SyncPurge)
        .await
        .unwrap();
    assert_eq!(removed, 1);
    assert_eq!(h.handle.status(), AdaptorStatus::Inactive);

    // The late reply must not resurrect anything
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(h.store.commit_count(1), 0);
    assert_eq!(h.store.record_count(1), 0);
    assert!(h.store.timestamp(1).is_none());
}

#[tokio::test]
async fn test_purge_surfaces_store_failures() {
    let h = Harness::with(ScriptedStrategy::new(vec![])).await;
    seed_two_accounts(&h.store);
    h.store.fail_purge.store(true, Ordering::SeqCst);

    let err = h
        .handle
        .purge_data_for_old_account(acct(1), PurgeMode::SyncPurge)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::CacheUnavailable(_)));
    assert_eq!(h.store.record_count(1), 2);
}
