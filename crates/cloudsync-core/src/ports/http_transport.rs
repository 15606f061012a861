//! HTTP transport port (driven/secondary port)
//!
//! Issues a single request and classifies what happened. Completion is a
//! typed [`RequestOutcome`] returned from the future; no state is carried
//! on the request object itself.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Request description
// ============================================================================

/// HTTP method of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// Where the access token goes on the wire
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AuthPlacement {
    /// `Authorization: Bearer <token>`
    #[default]
    BearerHeader,
    /// Query parameter with the given name, added only when the URL lacks it
    QueryParameter(String),
    /// No credentials attached
    None,
}

/// A provider-agnostic HTTP request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body, if any
    pub body: Option<serde_json::Value>,
    pub auth: AuthPlacement,
}

impl HttpRequest {
    /// Create a request with bearer authentication and no body
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            auth: AuthPlacement::BearerHeader,
        }
    }

    /// Shorthand for a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Shorthand for a POST request carrying a JSON body
    pub fn post_json(url: impl Into<String>, body: serde_json::Value) -> Self {
        let mut req = Self::new(HttpMethod::Post, url);
        req.body = Some(body);
        req
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_auth(mut self, auth: AuthPlacement) -> Self {
        self.auth = auth;
        self
    }
}

// ============================================================================
// Outcome classification
// ============================================================================

/// Why a request produced no HTTP response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkFailure {
    /// Connection, DNS or I/O failure
    Connection,
    /// The per-request timeout elapsed
    TimedOut,
    /// The request was force-expired by an abort
    Aborted,
    /// The request could not be built (bad URL, bad header)
    InvalidRequest,
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connection => "connection failed",
            Self::TimedOut => "timed out",
            Self::Aborted => "aborted",
            Self::InvalidRequest => "invalid request",
        };
        f.write_str(s)
    }
}

/// Result of issuing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    /// 2xx response
    Success { status: u16, body: Vec<u8> },
    /// No response was received
    NetworkError(NetworkFailure),
    /// Non-2xx response
    ProtocolError { status: u16, body: Vec<u8> },
}

impl RequestOutcome {
    /// HTTP status, when a response was received
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Success { status, .. } | Self::ProtocolError { status, .. } => Some(*status),
            Self::NetworkError(_) => None,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Port trait for the HTTP request/response layer
#[async_trait::async_trait]
pub trait IHttpTransport: Send + Sync {
    /// Issues the request and classifies the outcome
    ///
    /// # Arguments
    /// * `request` - Method, URL, headers, body and auth placement
    /// * `access_token` - Credential attached according to `request.auth`
    /// * `timeout` - Upper bound on the whole exchange
    async fn execute(
        &self,
        request: &HttpRequest,
        access_token: &str,
        timeout: Duration,
    ) -> RequestOutcome;
}
