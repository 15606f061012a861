//! Access tokens read from the environment
//!
//! Each configured account names the variable holding its token. The
//! variable is read at the start of every pass.

use std::collections::HashMap;

use anyhow::{bail, Context};
use cloudsync_core::config::AccountConfig;
use cloudsync_core::domain::{AccountId, Provider};
use cloudsync_core::ports::IAccessTokenProvider;
use tracing::warn;

/// Token provider for the accounts of one provider
#[derive(Debug, Clone, Default)]
pub struct EnvTokenProvider {
    variables: HashMap<AccountId, String>,
}

impl EnvTokenProvider {
    /// Collects the token variables of `provider`'s accounts
    pub fn for_provider(accounts: &[AccountConfig], provider: Provider) -> Self {
        let variables = accounts
            .iter()
            .filter(|a| a.provider == provider)
            .map(|a| (a.id, a.token_env.clone()))
            .collect();
        Self { variables }
    }
}

#[async_trait::async_trait]
impl IAccessTokenProvider for EnvTokenProvider {
    async fn access_token(&self, account: AccountId) -> anyhow::Result<String> {
        let variable = self
            .variables
            .get(&account)
            .with_context(|| format!("no token variable configured for account {account}"))?;
        let token = std::env::var(variable)
            .with_context(|| format!("environment variable {variable} is not set"))?;
        if token.trim().is_empty() {
            bail!("environment variable {variable} is empty");
        }
        Ok(token)
    }

    async fn report_expired(&self, account: AccountId) {
        warn!(
            %account,
            variable = self.variables.get(&account).map(String::as_str).unwrap_or("<none>"),
            "Access token rejected by provider; refresh it before the next pass"
        );
    }
}
