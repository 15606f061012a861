//! Sync strategy port
//!
//! One implementation per provider and data type. A strategy knows which
//! requests start a pass, how to read a response page, which non-2xx
//! statuses are benign for a given request, and what post-pass work to
//! queue. Everything else (busy counting, timeouts, removal detection,
//! commit) belongs to the engine.
//!
//! ## Design Notes
//!
//! - Strategies are synchronous and hold no per-pass state; per-branch state
//!   travels in [`PageRequest::context`] across continuations.
//! - A page's records belong to the container named on each record. Listing
//!   containers puts records under [`ContainerId::root`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::http_transport::HttpRequest;
use crate::domain::{
    AccountId, CacheRecord, ContainerId, DataType, DomainError, EntityId, Provider,
};

// ============================================================================
// Requests
// ============================================================================

/// What a request lists or fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    /// Lists the account's containers (records go under the root container)
    ListContainers,
    /// Lists the entities of one container
    ListEntities,
    /// Fetches detail for one entity; never completes a listing
    FetchDetail,
}

impl RequestKind {
    /// Whether the last page of this request completes its container's listing
    #[must_use]
    pub const fn is_listing(&self) -> bool {
        matches!(self, Self::ListContainers | Self::ListEntities)
    }
}

/// One guarded request the engine dispatches on behalf of a strategy
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub kind: RequestKind,
    /// Container this request lists, or the container of the fetched entity
    pub container: ContainerId,
    pub http: HttpRequest,
    /// Overrides the engine's default reply timeout
    pub timeout: Option<Duration>,
    /// Per-branch state carried to the response parser
    pub context: serde_json::Value,
    /// Zero for the first page of a branch, bumped by each continuation
    pub page: u32,
}

impl PageRequest {
    /// Request listing the account's containers
    pub fn list_containers(http: HttpRequest) -> Self {
        Self {
            kind: RequestKind::ListContainers,
            container: ContainerId::root(),
            http,
            timeout: None,
            context: serde_json::Value::Null,
            page: 0,
        }
    }

    /// Request listing the entities of `container`
    pub fn list_entities(container: ContainerId, http: HttpRequest) -> Self {
        Self {
            kind: RequestKind::ListEntities,
            container,
            http,
            timeout: None,
            context: serde_json::Value::Null,
            page: 0,
        }
    }

    /// Request fetching detail for an entity of `container`
    pub fn fetch_detail(container: ContainerId, http: HttpRequest) -> Self {
        Self {
            kind: RequestKind::FetchDetail,
            container,
            http,
            timeout: None,
            context: serde_json::Value::Null,
            page: 0,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }

    /// Continuation of this request with a new HTTP request, same kind and context
    #[must_use]
    pub fn continue_with(&self, http: HttpRequest) -> Self {
        Self {
            kind: self.kind,
            container: self.container.clone(),
            http,
            timeout: self.timeout,
            context: self.context.clone(),
            page: self.page.saturating_add(1),
        }
    }

    /// Whether this request fetches a later page of its branch
    #[must_use]
    pub const fn is_continuation(&self) -> bool {
        self.page > 0
    }
}

// ============================================================================
// Parsed responses
// ============================================================================

/// One entity read from a response page
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRecord {
    pub container: ContainerId,
    pub entity: EntityId,
    pub version: Option<String>,
    pub payload: serde_json::Value,
}

impl RemoteRecord {
    pub fn new(
        container: ContainerId,
        entity: EntityId,
        version: Option<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            container,
            entity,
            version,
            payload,
        }
    }

    /// Converts into a cache record stamped now
    pub fn into_cache_record(self) -> CacheRecord {
        CacheRecord::new(self.container, self.entity, self.version, self.payload)
    }
}

/// What a strategy extracted from one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    /// Entities seen on this page
    pub records: Vec<RemoteRecord>,
    /// Secondary requests discovered on this page (one branch each)
    pub dependents: Vec<PageRequest>,
    /// Next page of this same branch
    pub next_page: Option<PageRequest>,
}

impl ParsedPage {
    /// A final page with nothing on it
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_last(&self) -> bool {
        self.next_page.is_none()
    }
}

/// Errors raised while reading a response body
#[derive(Debug, Error)]
pub enum ParseError {
    /// Body is not the expected JSON
    #[error("Malformed response: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A required field is absent
    #[error("Missing field: {0}")]
    MissingField(String),

    /// An identifier in the response is not valid
    #[error("Invalid identifier: {0}")]
    InvalidId(#[from] DomainError),

    /// A continuation URL could not be interpreted
    #[error("Invalid continuation: {0}")]
    InvalidContinuation(String),
}

// ============================================================================
// Strategy contexts
// ============================================================================

/// Input to [`ISyncStrategy::begin_sync`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeginContext {
    pub account: AccountId,
    /// Start of the last successful pass, if any
    pub since: Option<DateTime<Utc>>,
}

/// Input to [`ISyncStrategy::finalize_requests`]
#[derive(Debug, Clone, Copy)]
pub struct FinalizeContext<'a> {
    pub account: AccountId,
    /// Records written during this pass
    pub written: &'a [CacheRecord],
}

// ============================================================================
// Strategy trait
// ============================================================================

/// Capability interface selecting provider and data type specific behavior
pub trait ISyncStrategy: Send + Sync {
    /// Provider this strategy talks to
    fn provider(&self) -> Provider;

    /// Data type this strategy synchronizes
    fn data_type(&self) -> DataType;

    /// Initial requests of a pass
    ///
    /// Returning no requests is allowed; the pass then finalizes directly.
    fn begin_sync(&self, ctx: &BeginContext) -> Vec<PageRequest>;

    /// Reads one successful response page
    ///
    /// # Arguments
    /// * `request` - The request the body answers
    /// * `body` - Raw response body
    fn parse_page(&self, request: &PageRequest, body: &[u8]) -> Result<ParsedPage, ParseError>;

    /// Whether a non-2xx status is benign for this request
    ///
    /// A benign status finishes the branch as an empty final page.
    fn treats_as_success(&self, _request: &PageRequest, _status: u16) -> bool {
        false
    }

    /// Post-pass work queued from finalize
    ///
    /// Called at most once per pass, and only for passes without errors.
    fn finalize_requests(&self, _ctx: &FinalizeContext<'_>) -> Vec<PageRequest> {
        Vec::new()
    }
}
