//! Shared helpers for remote integration tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use cloudsync_cache::{DatabasePool, SqliteResultStore};
use cloudsync_core::domain::{AccountId, AdaptorStatus, CacheRecord, DataType, Provider, StoreScope};
use cloudsync_core::ports::{IAccessTokenProvider, IResultStore, ISyncStrategy};
use cloudsync_engine::{AdaptorHandle, AdaptorSettings, SyncAdaptor};
use cloudsync_remote::{HttpClient, ProviderSettings};
use wiremock::MockServer;

pub const ACCOUNT: u32 = 11;

/// Hands out `token-{account}` and records expiry reports
#[derive(Default)]
pub struct FixedTokens {
    expired: Mutex<Vec<AccountId>>,
}

impl FixedTokens {
    pub fn expired(&self) -> Vec<AccountId> {
        self.expired.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl IAccessTokenProvider for FixedTokens {
    async fn access_token(&self, account: AccountId) -> anyhow::Result<String> {
        Ok(format!("token-{account}"))
    }

    async fn report_expired(&self, account: AccountId) {
        self.expired.lock().unwrap().push(account);
    }
}

pub struct SyncRig {
    pub handle: AdaptorHandle,
    pub store: Arc<SqliteResultStore>,
    pub tokens: Arc<FixedTokens>,
    pub provider: Provider,
}

impl SyncRig {
    /// Spawns an adaptor for `strategy` backed by a fresh in-memory store
    pub async fn start(strategy: Arc<dyn ISyncStrategy>) -> Self {
        let pool = DatabasePool::in_memory().await.unwrap();
        let store = Arc::new(SqliteResultStore::new(pool.pool().clone()));
        let tokens = Arc::new(FixedTokens::default());
        let provider = strategy.provider();

        let handle = SyncAdaptor::spawn(
            strategy,
            store.clone(),
            tokens.clone(),
            Arc::new(HttpClient::new()),
            AdaptorSettings::default(),
        );
        assert_eq!(
            handle.wait_until_settled().await.unwrap(),
            AdaptorStatus::Inactive
        );
        Self {
            handle,
            store,
            tokens,
            provider,
        }
    }

    pub async fn sync(&self) -> AdaptorStatus {
        self.handle
            .sync("images", AccountId::new(ACCOUNT))
            .await
            .unwrap();
        self.handle.wait_until_settled().await.unwrap()
    }

    pub fn scope(&self) -> StoreScope {
        StoreScope::new(self.provider, DataType::Images, AccountId::new(ACCOUNT))
    }

    pub async fn records(&self) -> Vec<CacheRecord> {
        self.store.query(&self.scope()).await.unwrap()
    }

    /// `container/entity` keys currently cached, sorted
    pub async fn keys(&self) -> Vec<String> {
        self.records()
            .await
            .into_iter()
            .map(|r| format!("{}/{}", r.container, r.entity))
            .collect()
    }
}

pub fn settings(server: &MockServer) -> ProviderSettings {
    ProviderSettings::new(server.uri())
}
