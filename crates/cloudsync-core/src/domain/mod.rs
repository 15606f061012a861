//! Domain entities and value types
//!
//! This module contains the core domain types for cloudsync:
//! - Newtypes for account, container and entity identifiers
//! - Provider and data type enumerations
//! - Adaptor status and purge modes
//! - Cache records and the per-pass change set
//! - Domain-specific error types

pub mod errors;
pub mod newtypes;
pub mod record;
pub mod status;

// Re-export commonly used types
pub use errors::DomainError;
pub use newtypes::*;
pub use record::{CacheRecord, ChangeSet, StoreScope};
pub use status::{AdaptorStatus, PurgeMode};
