//! HttpClient outcome classification against a live mock server

use std::time::Duration;

use cloudsync_core::ports::{
    AuthPlacement, HttpRequest, IHttpTransport, NetworkFailure, RequestOutcome,
};
use cloudsync_remote::HttpClient;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn test_success_returns_body_bytes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/drive/bundles"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"value": []})))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = HttpClient::new()
        .execute(
            &HttpRequest::get(format!("{}/me/drive/bundles", server.uri())),
            "tok",
            TIMEOUT,
        )
        .await;

    match outcome {
        RequestOutcome::Success { status, body } => {
            assert_eq!(status, 200);
            let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
            assert_eq!(value, json!({"value": []}));
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn test_non_2xx_is_protocol_error_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&server)
        .await;

    let outcome = HttpClient::new()
        .execute(
            &HttpRequest::get(format!("{}/missing", server.uri())),
            "tok",
            TIMEOUT,
        )
        .await;

    assert_eq!(
        outcome,
        RequestOutcome::ProtocolError {
            status: 404,
            body: b"not here".to_vec(),
        }
    );
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let outcome = HttpClient::new()
        .execute(
            &HttpRequest::get(format!("{}/slow", server.uri())),
            "tok",
            Duration::from_millis(200),
        )
        .await;

    assert_eq!(outcome, RequestOutcome::NetworkError(NetworkFailure::TimedOut));
}

#[tokio::test]
async fn test_refused_connection_is_connection_failure() {
    // Bind and drop a listener to get a port nobody listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let outcome = HttpClient::new()
        .execute(
            &HttpRequest::get(format!("http://127.0.0.1:{port}/")),
            "tok",
            TIMEOUT,
        )
        .await;

    assert_eq!(
        outcome,
        RequestOutcome::NetworkError(NetworkFailure::Connection)
    );
}

#[tokio::test]
async fn test_query_parameter_token_reaches_server() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me/albums"))
        .and(query_param("access_token", "fb-token"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let request = HttpRequest::get(format!("{}/me/albums?limit=5", server.uri()))
        .with_auth(AuthPlacement::QueryParameter("access_token".into()));
    let outcome = HttpClient::new().execute(&request, "fb-token", TIMEOUT).await;

    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_post_json_body_is_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/2/files/list_folder"))
        .and(body_json(json!({"path": "/Camera Uploads"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"entries": []})))
        .expect(1)
        .mount(&server)
        .await;

    let request = HttpRequest::post_json(
        format!("{}/2/files/list_folder", server.uri()),
        json!({"path": "/Camera Uploads"}),
    );
    let outcome = HttpClient::new().execute(&request, "tok", TIMEOUT).await;

    assert_eq!(outcome.status(), Some(200));
}
