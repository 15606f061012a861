//! Dropbox images: cursor continuation and the benign 409

use std::sync::Arc;

use cloudsync_core::domain::AdaptorStatus;
use cloudsync_core::ports::IResultStore;
use cloudsync_remote::DropboxImages;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, SyncRig};

async fn mount_folder(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(header("authorization", "Bearer token-11"))
        .and(body_partial_json(json!({"path": "/Camera Uploads"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [
                {".tag": "file", "id": "id:1", "name": "2024-01-01 10.00.00.jpg", "rev": "r1"},
                {".tag": "file", "id": "id:2", "name": "video.mov", "rev": "r2"}
            ],
            "cursor": "CUR1",
            "has_more": true
        })))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder/continue"))
        .and(body_partial_json(json!({"cursor": "CUR1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [
                {".tag": "file", "id": "id:3", "name": "2024-01-02 11.00.00.png", "rev": "r3"}
            ],
            "cursor": "CUR2",
            "has_more": false
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_folder_listing_follows_cursor() {
    let server = MockServer::start().await;
    mount_folder(&server).await;
    let rig = SyncRig::start(Arc::new(DropboxImages::new(common::settings(&server)))).await;

    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);
    assert_eq!(
        rig.keys().await,
        vec![
            "/camera uploads/id:1",
            "/camera uploads/id:3",
            "@root//camera uploads",
        ]
    );
}

#[tokio::test]
async fn test_missing_folder_clears_cached_files() {
    let server = MockServer::start().await;
    mount_folder(&server).await;
    let rig = SyncRig::start(Arc::new(DropboxImages::new(common::settings(&server)))).await;
    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error_summary": "path/not_found/..",
            "error": {".tag": "path", "path": {".tag": "not_found"}}
        })))
        .mount(&server)
        .await;

    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);
    assert_eq!(rig.keys().await, vec!["@root//camera uploads"]);
}

#[tokio::test]
async fn test_server_error_leaves_cache_alone() {
    let server = MockServer::start().await;
    mount_folder(&server).await;
    let rig = SyncRig::start(Arc::new(DropboxImages::new(common::settings(&server)))).await;
    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);
    let before = rig.keys().await;

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert_eq!(rig.sync().await, AdaptorStatus::Error);
    assert_eq!(rig.keys().await, before);
}

#[tokio::test]
async fn test_reset_cursor_keeps_files_on_unread_pages() {
    let server = MockServer::start().await;
    mount_folder(&server).await;
    let rig = SyncRig::start(Arc::new(DropboxImages::new(common::settings(&server)))).await;
    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);
    let before = rig.keys().await;
    let first = rig.store.last_sync_timestamp(&rig.scope()).await.unwrap();

    server.reset().await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": [
                {".tag": "file", "id": "id:1", "name": "2024-01-01 10.00.00.jpg", "rev": "r1"}
            ],
            "cursor": "CUR1",
            "has_more": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder/continue"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error_summary": "reset/..",
            "error": {".tag": "reset"}
        })))
        .mount(&server)
        .await;

    assert_eq!(rig.sync().await, AdaptorStatus::Error);
    assert_eq!(rig.keys().await, before);
    assert_eq!(
        rig.store.last_sync_timestamp(&rig.scope()).await.unwrap(),
        first
    );
}
