//! reqwest-backed HTTP transport
//!
//! Turns a provider-agnostic [`HttpRequest`] into a real request, attaches
//! the access token where the strategy asked for it, and classifies the
//! result into a [`RequestOutcome`]. The transport never retries; the
//! engine decides what a failure means.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use cloudsync_core::ports::{HttpRequest, IHttpTransport};
//! use cloudsync_remote::client::HttpClient;
//!
//! # async fn example() {
//! let client = HttpClient::new();
//! let request = HttpRequest::get("https://graph.microsoft.com/v1.0/me/drive/bundles");
//! let outcome = client.execute(&request, "access-token", Duration::from_secs(60)).await;
//! println!("{:?}", outcome.status());
//! # }
//! ```

use std::time::Duration;

use cloudsync_core::ports::{
    AuthPlacement, HttpMethod, HttpRequest, IHttpTransport, NetworkFailure, RequestOutcome,
};
use reqwest::{Client, Method};
use tracing::{debug, warn};
use url::Url;

// ============================================================================
// HttpClient
// ============================================================================

/// Shared HTTP client used by every adaptor of a process
///
/// Wraps `reqwest::Client`, which pools connections internally, so one
/// instance is cloned into all adaptors.
#[derive(Clone, Default)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with reqwest's default settings
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Builds the wire request for `request`
    ///
    /// # Arguments
    /// * `request` - Provider-agnostic request description
    /// * `access_token` - Token attached according to `request.auth`
    /// * `timeout` - Upper bound for the whole exchange
    ///
    /// # Errors
    /// `NetworkFailure::InvalidRequest` if the URL or a header is malformed
    pub fn build(
        &self,
        request: &HttpRequest,
        access_token: &str,
        timeout: Duration,
    ) -> Result<reqwest::Request, NetworkFailure> {
        let mut url = Url::parse(&request.url).map_err(|e| {
            warn!(url = %request.url, error = %e, "Rejecting request with invalid URL");
            NetworkFailure::InvalidRequest
        })?;

        if let AuthPlacement::QueryParameter(name) = &request.auth {
            let present = url.query_pairs().any(|(key, _)| key == name.as_str());
            if !present {
                url.query_pairs_mut().append_pair(name, access_token);
            }
        }

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method), url)
            .timeout(timeout);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if request.auth == AuthPlacement::BearerHeader {
            builder = builder.bearer_auth(access_token);
        }

        builder.build().map_err(|e| {
            warn!(url = %request.url, error = %e, "Failed to build request");
            NetworkFailure::InvalidRequest
        })
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Maps a reqwest error onto the engine's network failure kinds
fn classify_error(e: &reqwest::Error) -> NetworkFailure {
    if e.is_timeout() {
        NetworkFailure::TimedOut
    } else if e.is_builder() {
        NetworkFailure::InvalidRequest
    } else {
        NetworkFailure::Connection
    }
}

#[async_trait::async_trait]
impl IHttpTransport for HttpClient {
    async fn execute(
        &self,
        request: &HttpRequest,
        access_token: &str,
        timeout: Duration,
    ) -> RequestOutcome {
        let wire = match self.build(request, access_token, timeout) {
            Ok(wire) => wire,
            Err(failure) => return RequestOutcome::NetworkError(failure),
        };

        let response = match self.client.execute(wire).await {
            Ok(response) => response,
            Err(e) => {
                let failure = classify_error(&e);
                debug!(method = %request.method, url = %request.url, %failure, error = %e, "Request failed");
                return RequestOutcome::NetworkError(failure);
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                let failure = classify_error(&e);
                debug!(url = %request.url, %failure, error = %e, "Failed to read response body");
                return RequestOutcome::NetworkError(failure);
            }
        };

        debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            bytes = body.len(),
            "Response received"
        );

        if status.is_success() {
            RequestOutcome::Success {
                status: status.as_u16(),
                body,
            }
        } else {
            RequestOutcome::ProtocolError {
                status: status.as_u16(),
                body,
            }
        }
    }
}
