//! cloudsync Engine - Asynchronous multi-account sync orchestration
//!
//! Provides:
//! - Per-account busy counting with exactly-once finalize
//! - Removal detection against the local cache, gated on complete listings
//! - Pagination trees of guarded requests
//! - Reply-timeout watchdog with bulk abort
//! - Adaptor lifecycle (`Initializing`, `Inactive`, `Busy`, `Error`, `Invalid`)
//! - Account purge and orphan cleanup
//!
//! ## Modules
//!
//! - [`adaptor`] - The adaptor actor and its outward [`AdaptorHandle`]
//! - [`tracker`] - Per-account busy tracker
//! - [`removal`] - Removal-detection snapshot
//! - [`driver`] - Outcome classification and page application
//! - [`watchdog`] - Reply-timeout watchdog
//! - [`session`] - Per-account sync session state
//! - [`purge`] - Purge and cleanup path

pub mod adaptor;
pub mod driver;
pub mod purge;
pub mod removal;
pub mod session;
pub mod tracker;
pub mod watchdog;

pub use adaptor::{AdaptorHandle, AdaptorSettings, SyncAdaptor};

use cloudsync_core::domain::{AccountId, DomainError};
use cloudsync_core::ports::NetworkFailure;
use thiserror::Error;

/// Errors that can occur during synchronization operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// No response was received for a request
    #[error("Network error: {0}")]
    Network(NetworkFailure),

    /// The server answered with a non-2xx status
    #[error("Protocol error: HTTP {status}")]
    Protocol { status: u16 },

    /// The response body could not be read
    #[error("Malformed response: {0}")]
    Parse(String),

    /// The local store could not be read or written
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Busy-count bookkeeping went wrong for one account
    #[error("Invariant violation for account {account}: {detail}")]
    InvariantViolation { account: AccountId, detail: String },

    /// The provider rejected the account's access token
    #[error("Credentials expired for account {0}")]
    CredentialsExpired(AccountId),

    /// No access token could be obtained for the account
    #[error("Credentials unavailable for account {account}: {reason}")]
    CredentialsUnavailable { account: AccountId, reason: String },

    /// A trigger was refused in the current adaptor status
    #[error("Request rejected: {0}")]
    Rejected(String),

    /// The trigger named a data type this adaptor does not handle
    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    /// The adaptor task is no longer running
    #[error("Adaptor stopped")]
    AdaptorStopped,

    /// A domain-level error propagated from cloudsync-core
    #[error("Domain error: {0}")]
    DomainError(#[from] DomainError),
}
