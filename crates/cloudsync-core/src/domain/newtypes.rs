//! Domain newtypes with validation
//!
//! This module provides strongly-typed wrappers for the identifiers the sync
//! engine passes around. Each newtype ensures data validity at construction time.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// Account identifier
// ============================================================================

/// Opaque, externally assigned account identifier
///
/// Stable across sync passes. The engine never interprets the value beyond
/// using it as a key for sessions, busy counts and store partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(u32);

impl AccountId {
    /// Wrap a raw account number
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw account number
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AccountId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(Self)
            .map_err(|e| DomainError::InvalidId(format!("Invalid AccountId '{s}': {e}")))
    }
}

impl From<u32> for AccountId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

// ============================================================================
// Container and entity identifiers
// ============================================================================

/// Identifier of a grouping entity (album, folder) on the remote side
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContainerId(String);

impl ContainerId {
    /// Raw value of the root pseudo-container
    pub const ROOT: &'static str = "@root";

    /// Create a new ContainerId, rejecting empty values
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidId(
                "ContainerId cannot be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// The pseudo-container whose entities are the account's containers
    ///
    /// Albums and folders are recorded under this container, so the removal
    /// of a whole album goes through the same diffing as the removal of a photo.
    #[must_use]
    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    /// Whether this is the root pseudo-container
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    /// Get the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ContainerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContainerId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for ContainerId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContainerId> for String {
    fn from(id: ContainerId) -> Self {
        id.0
    }
}

/// Identifier of a leaf entity (photo, file, post) on the remote side
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// Create a new EntityId, rejecting empty values
    pub fn new(id: impl Into<String>) -> Result<Self, DomainError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(DomainError::InvalidId("EntityId cannot be empty".to_string()));
        }
        Ok(Self(id))
    }

    /// Get the inner string value
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl From<&ContainerId> for EntityId {
    /// A container is itself an entity of the root pseudo-container
    fn from(id: &ContainerId) -> Self {
        Self(id.0.clone())
    }
}

impl From<&EntityId> for ContainerId {
    /// Entities listed under the root pseudo-container are containers
    fn from(id: &EntityId) -> Self {
        Self(id.0.clone())
    }
}

// ============================================================================
// Provider and data type
// ============================================================================

/// Remote service an adaptor talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Facebook,
    Google,
    Dropbox,
    OneDrive,
    Vk,
}

impl Provider {
    /// Stable lowercase name, used as a store partition key
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Google => "google",
            Self::Dropbox => "dropbox",
            Self::OneDrive => "onedrive",
            Self::Vk => "vk",
        }
    }
}

impl Display for Provider {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "facebook" => Ok(Self::Facebook),
            "google" => Ok(Self::Google),
            "dropbox" => Ok(Self::Dropbox),
            "onedrive" => Ok(Self::OneDrive),
            "vk" => Ok(Self::Vk),
            _ => Err(DomainError::UnknownProvider(s.to_string())),
        }
    }
}

/// Kind of data an adaptor synchronizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Images,
    Posts,
    Contacts,
    Calendars,
    Notifications,
    Credentials,
}

impl DataType {
    /// Every known data type
    pub const ALL: [DataType; 6] = [
        Self::Images,
        Self::Posts,
        Self::Contacts,
        Self::Calendars,
        Self::Notifications,
        Self::Credentials,
    ];

    /// Stable lowercase name, as used by the trigger interface
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Images => "images",
            Self::Posts => "posts",
            Self::Contacts => "contacts",
            Self::Calendars => "calendars",
            Self::Notifications => "notifications",
            Self::Credentials => "credentials",
        }
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|dt| dt.as_str() == lowered)
            .ok_or_else(|| DomainError::UnknownDataType(s.to_string()))
    }
}
