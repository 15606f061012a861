//! Domain error types
//!
//! This module defines error types specific to domain operations,
//! mainly validation failures when constructing identifiers and
//! parsing names received over the trigger interface.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Identifier parsing or validation error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// Unknown provider name
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Unknown data type name
    #[error("Unknown data type: {0}")]
    UnknownDataType(String),

    /// Unknown purge mode name
    #[error("Unknown purge mode: {0}")]
    UnknownPurgeMode(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
