//! OneDrive images: full passes against a mocked Graph API

use std::sync::Arc;

use cloudsync_core::domain::{AccountId, AdaptorStatus};
use cloudsync_core::ports::IResultStore;
use cloudsync_remote::OneDriveImages;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, SyncRig};

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Two album pages (ALB1, then ALB2), one children page each, thumbnails for all
async fn mount_drive(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/me/drive/bundles"))
        .and(query_param("$filter", "bundle/album ne null"))
        .and(header("authorization", "Bearer token-11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "ALB1", "eTag": "a1", "name": "Holidays", "bundle": {"album": {}}}],
            "@odata.nextLink": format!("{}/me/drive/bundles?$skiptoken=page2", server.uri())
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/me/drive/bundles"))
        .and(query_param("$skiptoken", "page2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{"id": "ALB2", "eTag": "a2", "name": "Pets", "bundle": {"album": {}}}]
        })))
        .mount(server)
        .await;

    mount_json(
        server,
        "/me/drive/items/ALB1/children",
        json!({"value": [
            {"id": "P1", "eTag": "p1v1", "name": "beach.jpg", "image": {}},
            {"id": "DOC", "eTag": "d", "name": "itinerary.pdf", "file": {}}
        ]}),
    )
    .await;
    mount_json(
        server,
        "/me/drive/items/ALB2/children",
        json!({"value": [{"id": "P2", "eTag": "p2v1", "name": "cat.jpg", "photo": {}}]}),
    )
    .await;

    for id in ["P1", "P2"] {
        mount_json(
            server,
            &format!("/me/drive/items/{id}/thumbnails"),
            json!({"value": [{"id": "0", "small": {"url": format!("https://cdn.test/{id}-s.jpg")}}]}),
        )
        .await;
    }
}

#[tokio::test]
async fn test_full_pass_caches_albums_photos_and_thumbnails() {
    let server = MockServer::start().await;
    mount_drive(&server).await;
    let rig = SyncRig::start(Arc::new(OneDriveImages::new(common::settings(&server)))).await;

    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);

    assert_eq!(
        rig.keys().await,
        vec!["@root/ALB1", "@root/ALB2", "ALB1/P1", "ALB2/P2"]
    );
    let p1 = rig
        .records()
        .await
        .into_iter()
        .find(|r| r.entity.as_str() == "P1")
        .unwrap();
    assert_eq!(p1.version.as_deref(), Some("p1v1"));
    assert_eq!(
        p1.payload["thumbnails"][0]["small"]["url"],
        "https://cdn.test/P1-s.jpg"
    );
    assert!(rig
        .store
        .last_sync_timestamp(&rig.scope())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_deleted_album_is_cascaded_on_next_pass() {
    let server = MockServer::start().await;
    mount_drive(&server).await;
    let rig = SyncRig::start(Arc::new(OneDriveImages::new(common::settings(&server)))).await;
    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);

    // ALB2 disappears and ALB1 gains a photo
    server.reset().await;
    mount_json(
        &server,
        "/me/drive/bundles",
        json!({"value": [{"id": "ALB1", "eTag": "a1b", "name": "Holidays"}]}),
    )
    .await;
    mount_json(
        &server,
        "/me/drive/items/ALB1/children",
        json!({"value": [
            {"id": "P1", "eTag": "p1v1", "image": {}},
            {"id": "P3", "eTag": "p3v1", "image": {}}
        ]}),
    )
    .await;
    mount_json(
        &server,
        "/me/drive/items/P3/thumbnails",
        json!({"value": []}),
    )
    .await;

    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);
    assert_eq!(
        rig.keys().await,
        vec!["@root/ALB1", "ALB1/P1", "ALB1/P3"]
    );

    // P1 was unchanged, so it kept its thumbnails from the first pass
    let p1 = rig
        .records()
        .await
        .into_iter()
        .find(|r| r.entity.as_str() == "P1")
        .unwrap();
    assert!(p1.payload["thumbnails"].is_array());
}

#[tokio::test]
async fn test_failed_children_listing_keeps_cached_photos() {
    let server = MockServer::start().await;
    mount_drive(&server).await;
    let rig = SyncRig::start(Arc::new(OneDriveImages::new(common::settings(&server)))).await;
    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);
    let first = rig.store.last_sync_timestamp(&rig.scope()).await.unwrap();

    server.reset().await;
    mount_json(
        &server,
        "/me/drive/bundles",
        json!({"value": [
            {"id": "ALB1", "eTag": "a1"},
            {"id": "ALB2", "eTag": "a2"}
        ]}),
    )
    .await;
    mount_json(&server, "/me/drive/items/ALB1/children", json!({"value": []})).await;
    Mock::given(method("GET"))
        .and(path("/me/drive/items/ALB2/children"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    rig.handle.reset().await.unwrap();
    assert_eq!(rig.sync().await, AdaptorStatus::Error);

    // ALB1 listed empty in an errored pass is not trusted; ALB2 never completed
    assert_eq!(
        rig.keys().await,
        vec!["@root/ALB1", "@root/ALB2", "ALB1/P1", "ALB2/P2"]
    );
    assert_eq!(
        rig.store.last_sync_timestamp(&rig.scope()).await.unwrap(),
        first
    );
}

#[tokio::test]
async fn test_unauthorized_reports_expired_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/bundles"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": {"code": "InvalidAuthenticationToken"}
        })))
        .mount(&server)
        .await;
    let rig = SyncRig::start(Arc::new(OneDriveImages::new(common::settings(&server)))).await;

    assert_eq!(rig.sync().await, AdaptorStatus::Error);
    assert_eq!(rig.tokens.expired(), vec![AccountId::new(common::ACCOUNT)]);
    assert!(rig.records().await.is_empty());
}
