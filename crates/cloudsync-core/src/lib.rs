//! cloudsync Core - Domain types, ports and configuration
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `AccountId`, `ContainerId`, `EntityId`, `DataType`,
//!   `AdaptorStatus`, `CacheRecord`, `ChangeSet`
//! - **Port definitions** - Traits for adapters: `IResultStore`,
//!   `IAccessTokenProvider`, `IHttpTransport`, `ISyncStrategy`
//! - **Configuration** - YAML-backed settings for the engine, cache and accounts
//!
//! # Architecture
//!
//! The domain module holds plain data with validation and no I/O.
//! Ports define the trait interfaces the sync engine consumes; the
//! implementations live in `cloudsync-remote` (HTTP and provider strategies)
//! and `cloudsync-cache` (SQLite result store).

pub mod config;
pub mod domain;
pub mod ports;
