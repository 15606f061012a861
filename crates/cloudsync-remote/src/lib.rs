//! cloudsync remote - HTTP transport and provider strategies
//!
//! ## Modules
//!
//! - [`client`] - reqwest-backed `IHttpTransport`
//! - [`providers`] - `ISyncStrategy` implementations per provider
//!
//! [`strategy_for`] picks the strategy for a configured provider and data
//! type; combinations without a strategy are reported as
//! [`RemoteError::Unsupported`].

pub mod client;
pub mod providers;

use std::sync::Arc;

use cloudsync_core::config::Config;
use cloudsync_core::domain::{DataType, Provider};
use cloudsync_core::ports::ISyncStrategy;
use thiserror::Error;

pub use client::HttpClient;
pub use providers::{DropboxImages, FacebookImages, OneDriveImages, ProviderSettings};

/// Errors raised while wiring up remote access
#[derive(Debug, Error)]
pub enum RemoteError {
    /// No strategy exists for the provider and data type
    #[error("No sync strategy for {provider}/{data_type}")]
    Unsupported {
        provider: Provider,
        data_type: DataType,
    },

    /// The provider has no configuration section
    #[error("Provider {0} is not configured")]
    NotConfigured(Provider),
}

/// Builds the strategy for `provider` and `data_type` from configuration
///
/// # Errors
/// `RemoteError::Unsupported` when the combination has no strategy,
/// `RemoteError::NotConfigured` when the provider has no config section.
pub fn strategy_for(
    config: &Config,
    provider: Provider,
    data_type: DataType,
) -> Result<Arc<dyn ISyncStrategy>, RemoteError> {
    let section = config
        .provider(provider)
        .ok_or(RemoteError::NotConfigured(provider))?;
    let transfer_timeout = config.engine.transfer_timeout();

    let strategy: Arc<dyn ISyncStrategy> = match (provider, data_type) {
        (Provider::OneDrive, DataType::Images) => Arc::new(OneDriveImages::new(
            ProviderSettings::from_config(section, providers::onedrive::GRAPH_BASE_URL, transfer_timeout),
        )),
        (Provider::Facebook, DataType::Images) => Arc::new(FacebookImages::new(
            ProviderSettings::from_config(section, providers::facebook::FACEBOOK_BASE_URL, transfer_timeout),
        )),
        (Provider::Dropbox, DataType::Images) => Arc::new(DropboxImages::new(
            ProviderSettings::from_config(section, providers::dropbox::DROPBOX_BASE_URL, transfer_timeout),
        )),
        _ => {
            return Err(RemoteError::Unsupported {
                provider,
                data_type,
            })
        }
    };

    tracing::debug!(%provider, %data_type, "Sync strategy selected");
    Ok(strategy)
}
