//! Request timeouts and abort, on a paused clock

use std::time::Duration;

use cloudsync_core::domain::AdaptorStatus;
use serde_json::json;
use tokio::time::Instant;

use crate::common::*;

#[tokio::test(start_paused = true)]
async fn test_hung_request_times_out_after_default_timeout() {
    let h = Harness::with(ScriptedStrategy::new(vec![Seed::list("A", "mem://A/1")])).await;
    h.transport.hang("mem://A/1");
    let started = Instant::now();

    h.handle.sync("images", acct(1)).await.unwrap();
    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(h.handle.status(), AdaptorStatus::Busy);

    let status = h.handle.wait_until_settled().await.unwrap();
    assert_eq!(status, AdaptorStatus::Error);
    assert!(started.elapsed() >= Duration::from_secs(60));
    assert!(h.store.timestamp(1).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_per_request_timeout_overrides_default() {
    let seed = Seed::list("A", "mem://A/1").with_timeout(Duration::from_secs(600));
    let h = Harness::with(ScriptedStrategy::new(vec![seed])).await;
    h.transport.page_after(
        "mem://A/1",
        Duration::from_secs(300),
        json!({"records": [{"id": "big", "version": "1"}]}),
    );

    let status = h.sync_and_settle(1).await;
    assert_eq!(status, AdaptorStatus::Inactive);
    assert_eq!(h.store.entities(1, "A"), vec!["big"]);
}

#[tokio::test(start_paused = true)]
async fn test_abort_expires_every_outstanding_request() {
    let h = Harness::with(ScriptedStrategy::new(vec![
        Seed::list("A", "mem://A/1"),
        Seed::list("B", "mem://B/1"),
        Seed::list("C", "mem://C/1"),
    ]))
    .await;
    h.store.seed(
        7,
        vec![
            record("A", "a1", "1"),
            record("B", "b1", "1"),
            record("C", "c1", "1"),
        ],
    );
    h.transport.hang("mem://A/1");
    h.transport.hang("mem://B/1");
    h.transport.hang("mem://C/1");

    h.handle.sync("images", acct(7)).await.unwrap();
    assert_eq!(h.handle.status(), AdaptorStatus::Busy);
    let started = Instant::now();

    assert_eq!(h.handle.abort_sync().await.unwrap(), 3);
    let status = h.handle.wait_until_settled().await.unwrap();

    // Aborted outcomes arrive without waiting for the reply timeout
    assert!(started.elapsed() < Duration::from_secs(60));
    assert_eq!(status, AdaptorStatus::Error);
    assert_eq!(h.store.commit_count(7), 1);
    assert_eq!(h.store.record_count(7), 3);
    assert!(h.store.timestamp(7).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_abort_with_nothing_outstanding_is_a_no_op() {
    let h = Harness::with(ScriptedStrategy::new(vec![])).await;
    assert_eq!(h.handle.abort_sync().await.unwrap(), 0);
    assert_eq!(h.handle.status(), AdaptorStatus::Inactive);
}

#[tokio::test(start_paused = true)]
async fn test_adaptor_recovers_after_abort_and_reset() {
    let h = Harness::with(ScriptedStrategy::new(vec![Seed::list("A", "mem://A/1")])).await;
    h.transport.hang("mem://A/1");

    h.handle.sync("images", acct(1)).await.unwrap();
    h.handle.abort_sync().await.unwrap();
    assert_eq!(h.handle.wait_until_settled().await.unwrap(), AdaptorStatus::Error);

    h.handle.reset().await.unwrap();
    h.transport
        .page("mem://A/1", json!({"records": [{"id": "a1", "version": "1"}]}));
    assert_eq!(h.sync_and_settle(1).await, AdaptorStatus::Inactive);
    assert_eq!(h.store.entities(1, "A"), vec!["a1"]);
}

#[tokio::test(start_paused = true)]
async fn test_reply_racing_its_timeout_is_counted_once() {
    let h = Harness::with(ScriptedStrategy::new(vec![Seed::list("A", "mem://A/1")])).await;
    h.transport.page_after(
        "mem://A/1",
        Duration::from_secs(60),
        json!({"records": [{"id": "a1", "version": "1"}]}),
    );

    let status = h.sync_and_settle(1).await;

    // Either the reply or the timeout wins, but only one is applied
    assert!(status.is_settled());
    assert_ne!(status, AdaptorStatus::Invalid);
    assert_eq!(h.store.commit_count(1), 1);
    assert_eq!(h.transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_of_one_account_does_not_fail_another() {
    let h = Harness::with(ScriptedStrategy::new(vec![Seed::list("A", "mem://{account}/A")])).await;
    h.transport.hang("mem://1/A");
    h.transport.page_after(
        "mem://2/A",
        Duration::from_secs(10),
        json!({"records": [{"id": "ok", "version": "1"}]}),
    );

    h.handle
        .sync_accounts("images", &[acct(1), acct(2)])
        .await
        .unwrap();
    let status = h.handle.wait_until_settled().await.unwrap();

    assert_eq!(status, AdaptorStatus::Error);
    assert!(h.store.timestamp(1).is_none());
    assert!(h.store.timestamp(2).is_some());
    assert_eq!(h.store.entities(2, "A"), vec!["ok"]);
}
