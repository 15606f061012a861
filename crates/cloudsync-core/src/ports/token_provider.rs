//! Access token provider port (driven/secondary port)
//!
//! Account and credential storage live outside the sync engine. The engine
//! only asks for a token at the start of a pass and reports when the
//! provider rejected it; refreshing is the implementation's business.

use crate::domain::AccountId;

/// Port trait for obtaining account credentials
#[async_trait::async_trait]
pub trait IAccessTokenProvider: Send + Sync {
    /// Returns the current access token for the account
    ///
    /// An error means the credentials are unavailable and the account's
    /// pass fails before any request is dispatched.
    async fn access_token(&self, account: AccountId) -> anyhow::Result<String>;

    /// Signals that the provider rejected the account's token
    ///
    /// Called once per rejected request so external refresh flows can run.
    async fn report_expired(&self, account: AccountId);
}
