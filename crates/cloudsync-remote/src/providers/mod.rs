//! Per-provider sync strategies
//!
//! Each strategy knows how to list one provider's containers and entities
//! for one data type. Field mapping is thin: id, version marker, the raw
//! item as payload, and the continuation link.
//!
//! - [`onedrive::OneDriveImages`] - Microsoft Graph photo albums
//! - [`facebook::FacebookImages`] - Facebook Graph albums and photos
//! - [`dropbox::DropboxImages`] - Dropbox camera uploads folder

pub mod dropbox;
pub mod facebook;
pub mod onedrive;

use std::time::Duration;

use cloudsync_core::config::ProviderConfig;
use url::Url;

pub use dropbox::DropboxImages;
pub use facebook::FacebookImages;
pub use onedrive::OneDriveImages;

/// Settings shared by every provider strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    /// API base URL without a trailing slash
    pub base_url: String,
    /// Items requested per page
    pub page_size: u32,
    /// Extra non-2xx statuses treated as an empty final page
    pub benign_statuses: Vec<u16>,
    /// Reply timeout for slow requests (detail and transfer lookups)
    pub transfer_timeout: Duration,
}

impl ProviderSettings {
    /// Settings with defaults for everything but the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: trim_base(base_url.into()),
            page_size: 100,
            benign_statuses: Vec::new(),
            transfer_timeout: Duration::from_secs(600),
        }
    }

    /// Builds settings from a provider config section
    ///
    /// # Arguments
    /// * `config` - The provider's section of the configuration
    /// * `default_base` - Public endpoint used when `config.base_url` is empty
    /// * `transfer_timeout` - Engine-wide timeout for slow requests
    pub fn from_config(config: &ProviderConfig, default_base: &str, transfer_timeout: Duration) -> Self {
        let base = if config.base_url.is_empty() {
            default_base.to_string()
        } else {
            config.base_url.clone()
        };
        Self {
            base_url: trim_base(base),
            page_size: config.page_size,
            benign_statuses: config.benign_statuses.clone(),
            transfer_timeout,
        }
    }

    /// Absolute URL for `path` with `params` encoded into the query
    ///
    /// Falls back to plain concatenation when the base does not parse; the
    /// transport then reports the request as invalid.
    pub(crate) fn endpoint(&self, path: &str, params: &[(&str, String)]) -> String {
        let raw = format!("{}{}", self.base_url, path);
        match Url::parse(&raw) {
            Ok(mut url) => {
                if !params.is_empty() {
                    let mut query = url.query_pairs_mut();
                    for (key, value) in params {
                        query.append_pair(key, value);
                    }
                }
                url.into()
            }
            Err(_) => raw,
        }
    }

    pub(crate) fn is_benign(&self, status: u16) -> bool {
        self.benign_statuses.contains(&status)
    }
}

fn trim_base(base: String) -> String {
    base.trim_end_matches('/').to_string()
}
