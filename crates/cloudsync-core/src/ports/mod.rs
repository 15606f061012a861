//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync engine
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IResultStore`] - Local cache of synced records and last-sync timestamps
//! - [`IAccessTokenProvider`] - Account credentials and the "token expired" signal
//! - [`IHttpTransport`] - Issues one HTTP request and classifies its outcome
//! - [`ISyncStrategy`] - Per provider/data type capability: what to request and how to read it

pub mod http_transport;
pub mod result_store;
pub mod sync_strategy;
pub mod token_provider;

pub use http_transport::{
    AuthPlacement, HttpMethod, HttpRequest, IHttpTransport, NetworkFailure, RequestOutcome,
};
pub use result_store::IResultStore;
pub use sync_strategy::{
    BeginContext, FinalizeContext, ISyncStrategy, PageRequest, ParseError, ParsedPage,
    RemoteRecord, RequestKind,
};
pub use token_provider::IAccessTokenProvider;
