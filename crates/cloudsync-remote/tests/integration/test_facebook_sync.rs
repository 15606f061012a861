//! Facebook images: query-parameter tokens and `paging.next`

use std::sync::Arc;

use cloudsync_core::domain::AdaptorStatus;
use cloudsync_remote::FacebookImages;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{self, SyncRig};

#[tokio::test]
async fn test_albums_and_paged_photos() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/me/albums"))
        .and(query_param("access_token", "token-11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "500", "name": "Mobile Uploads", "updated_time": "2024-05-01T08:00:00+0000"}],
            "paging": {"cursors": {"before": "x", "after": "y"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/500/photos"))
        .and(query_param("after", "PAGE2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "9002", "updated_time": "2024-05-02T00:00:00+0000"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/500/photos"))
        .and(query_param("access_token", "token-11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "9001", "updated_time": "2024-05-01T00:00:00+0000"}],
            "paging": {
                "next": format!("{}/500/photos?after=PAGE2&access_token=token-11", server.uri())
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let rig = SyncRig::start(Arc::new(FacebookImages::new(common::settings(&server)))).await;
    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);

    assert_eq!(
        rig.keys().await,
        vec!["500/9001", "500/9002", "@root/500"]
    );
    let photo = rig
        .records()
        .await
        .into_iter()
        .find(|r| r.entity.as_str() == "9002")
        .unwrap();
    assert_eq!(photo.version.as_deref(), Some("2024-05-02T00:00:00+0000"));
}

#[tokio::test]
async fn test_unchanged_photos_are_not_rewritten() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/albums"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "500", "updated_time": "t0"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/500/photos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "9001", "updated_time": "t1"}]
        })))
        .mount(&server)
        .await;

    let rig = SyncRig::start(Arc::new(FacebookImages::new(common::settings(&server)))).await;
    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);
    let first: Vec<_> = rig.records().await.into_iter().map(|r| r.updated_at).collect();

    assert_eq!(rig.sync().await, AdaptorStatus::Inactive);
    let second: Vec<_> = rig.records().await.into_iter().map(|r| r.updated_at).collect();

    assert_eq!(first, second);
}
