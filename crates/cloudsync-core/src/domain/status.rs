//! Adaptor status and purge modes

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Overall status of one adaptor instance
///
/// The lifecycle is `Initializing -> Inactive <-> Busy -> Error`, with
/// `Invalid` reached when the local store could not be initialised.
/// `Error` blocks new sync triggers until an external reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdaptorStatus {
    /// Adaptor constructed, store not yet initialised
    Initializing,
    /// Ready for the next trigger
    Inactive,
    /// At least one account has outstanding operations
    Busy,
    /// The last pass failed; requires a reset
    Error,
    /// The adaptor could not initialise its dependencies
    Invalid,
}

impl AdaptorStatus {
    /// Whether a new sync pass may start from this status
    #[must_use]
    pub const fn accepts_sync(&self) -> bool {
        matches!(self, Self::Inactive)
    }

    /// Whether the adaptor has come to rest (no pass running)
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Inactive | Self::Error | Self::Invalid)
    }
}

impl Display for AdaptorStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initializing => "initializing",
            Self::Inactive => "inactive",
            Self::Busy => "busy",
            Self::Error => "error",
            Self::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// How an account's data is purged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurgeMode {
    /// Credentials revoked or account removed; touch caches only
    SyncPurge,
    /// Adaptor is being torn down; also sweep orphans and flush the store
    CleanUpPurge,
}

impl Display for PurgeMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::SyncPurge => f.write_str("sync_purge"),
            Self::CleanUpPurge => f.write_str("clean_up_purge"),
        }
    }
}

impl FromStr for PurgeMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync_purge" | "SyncPurge" => Ok(Self::SyncPurge),
            "clean_up_purge" | "CleanUpPurge" => Ok(Self::CleanUpPurge),
            _ => Err(DomainError::UnknownPurgeMode(s.to_string())),
        }
    }
}
