//! Configuration module for cloudsync.
//!
//! The YAML file maps onto [`Config`]. Every section has defaults, so a
//! missing file or section still yields a runnable configuration;
//! [`Config::validate`] reports everything wrong at once.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{AccountId, DataType, Provider};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for cloudsync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
    pub providers: ProvidersConfig,
    pub accounts: Vec<AccountConfig>,
}

/// Sync engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default reply timeout for a request, in seconds.
    pub request_timeout_secs: u64,
    /// Reply timeout for large transfers, in seconds.
    pub transfer_timeout_secs: u64,
    /// Seconds between scheduled sync passes.
    pub poll_interval_secs: u64,
}

/// Local result store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Path to the SQLite database file.
    pub path: PathBuf,
}

/// Subscriber settings for the daemon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Output format: `pretty` or `json`.
    pub format: String,
}

/// Per-provider endpoint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub onedrive: ProviderConfig,
    pub facebook: ProviderConfig,
    pub dropbox: ProviderConfig,
}

/// Endpoint settings for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API base URL; empty means the provider's public endpoint.
    pub base_url: String,
    /// Items requested per page.
    pub page_size: u32,
    /// Non-2xx statuses treated as an empty final page.
    pub benign_statuses: Vec<u16>,
}

/// One account to synchronize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountConfig {
    /// Externally assigned account id.
    pub id: AccountId,
    /// Provider the account belongs to.
    pub provider: Provider,
    /// Data types to synchronize for this account.
    pub data_types: Vec<DataType>,
    /// Environment variable holding the account's access token.
    pub token_env: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Reads and parses the YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Like [`Config::load`], but any read or parse error yields the defaults.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Where the daemon looks for its configuration.
    ///
    /// Typically `$XDG_CONFIG_HOME/cloudsync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("cloudsync")
            .join("config.yaml")
    }

    /// Provider section for `provider`, if one is configurable.
    pub fn provider(&self, provider: Provider) -> Option<&ProviderConfig> {
        match provider {
            Provider::OneDrive => Some(&self.providers.onedrive),
            Provider::Facebook => Some(&self.providers.facebook),
            Provider::Dropbox => Some(&self.providers.dropbox),
            Provider::Google | Provider::Vk => None,
        }
    }
}

impl EngineConfig {
    /// Default reply timeout as a [`Duration`].
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Transfer reply timeout as a [`Duration`].
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_secs(self.transfer_timeout_secs)
    }

    /// Interval between scheduled passes as a [`Duration`].
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 60,
            transfer_timeout_secs: 600,
            poll_interval_secs: 1800,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("cloudsync")
                .join("cache.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            page_size: 100,
            benign_statuses: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// One problem found by [`Config::validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"engine.request_timeout_secs"`.
    pub field: String,
    /// What is wrong with the value.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Accepted `logging.level` values.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `logging.format`.
const VALID_LOG_FORMATS: &[&str] = &["pretty", "json"];

impl Config {
    /// Checks every section and collects all problems.
    ///
    /// Returns an empty vector for a usable configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- engine ---
        if self.engine.request_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "engine.request_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.engine.transfer_timeout_secs < self.engine.request_timeout_secs {
            errors.push(ValidationError {
                field: "engine.transfer_timeout_secs".into(),
                message: format!(
                    "transfer_timeout_secs ({}) must not be less than request_timeout_secs ({})",
                    self.engine.transfer_timeout_secs, self.engine.request_timeout_secs
                ),
            });
        }
        if self.engine.poll_interval_secs == 0 {
            errors.push(ValidationError {
                field: "engine.poll_interval_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- cache ---
        if self.cache.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "cache.path".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }
        if !VALID_LOG_FORMATS.contains(&self.logging.format.as_str()) {
            errors.push(ValidationError {
                field: "logging.format".into(),
                message: format!(
                    "invalid format '{}'; valid options: {}",
                    self.logging.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            });
        }

        // --- providers ---
        for (name, section) in [
            ("onedrive", &self.providers.onedrive),
            ("facebook", &self.providers.facebook),
            ("dropbox", &self.providers.dropbox),
        ] {
            validate_provider(name, section, &mut errors);
        }

        // --- accounts ---
        let mut seen = HashSet::new();
        for (i, account) in self.accounts.iter().enumerate() {
            if !seen.insert((account.id, account.provider)) {
                errors.push(ValidationError {
                    field: format!("accounts[{i}].id"),
                    message: format!(
                        "duplicate account {} for provider {}",
                        account.id, account.provider
                    ),
                });
            }
            if account.data_types.is_empty() {
                errors.push(ValidationError {
                    field: format!("accounts[{i}].data_types"),
                    message: "must list at least one data type".into(),
                });
            }
            if account.token_env.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("accounts[{i}].token_env"),
                    message: "must not be empty".into(),
                });
            }
        }

        errors
    }
}

fn validate_provider(name: &str, section: &ProviderConfig, errors: &mut Vec<ValidationError>) {
    if !section.base_url.is_empty()
        && !(section.base_url.starts_with("http://") || section.base_url.starts_with("https://"))
    {
        errors.push(ValidationError {
            field: format!("providers.{name}.base_url"),
            message: format!("must be an http(s) URL, got '{}'", section.base_url),
        });
    }
    if section.page_size == 0 || section.page_size > 1000 {
        errors.push(ValidationError {
            field: format!("providers.{name}.page_size"),
            message: "must be in range 1..=1000".into(),
        });
    }
    for status in &section.benign_statuses {
        if !(400..=599).contains(status) {
            errors.push(ValidationError {
                field: format!("providers.{name}.benign_statuses"),
                message: format!("{status} is not an error status"),
            });
        }
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Programmatic [`Config`] construction, mostly for tests and embedders.
///
/// # Example
///
/// ```rust,no_run
/// use cloudsync_core::config::ConfigBuilder;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .cache_path(PathBuf::from("/var/lib/cloudsync/cache.db"))
///     .engine_request_timeout_secs(30)
///     .logging_level("debug")
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Starts a builder from the defaults.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    // --- engine ---

    pub fn engine_request_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.engine.request_timeout_secs = seconds;
        self
    }

    pub fn engine_transfer_timeout_secs(mut self, seconds: u64) -> Self {
        self.config.engine.transfer_timeout_secs = seconds;
        self
    }

    pub fn engine_poll_interval_secs(mut self, seconds: u64) -> Self {
        self.config.engine.poll_interval_secs = seconds;
        self
    }

    // --- cache ---

    pub fn cache_path(mut self, path: PathBuf) -> Self {
        self.config.cache.path = path;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn logging_format(mut self, format: impl Into<String>) -> Self {
        self.config.logging.format = format.into();
        self
    }

    // --- providers ---

    pub fn provider_base_url(mut self, provider: Provider, url: impl Into<String>) -> Self {
        if let Some(section) = self.provider_mut(provider) {
            section.base_url = url.into();
        }
        self
    }

    pub fn provider_page_size(mut self, provider: Provider, page_size: u32) -> Self {
        if let Some(section) = self.provider_mut(provider) {
            section.page_size = page_size;
        }
        self
    }

    pub fn provider_benign_statuses(mut self, provider: Provider, statuses: Vec<u16>) -> Self {
        if let Some(section) = self.provider_mut(provider) {
            section.benign_statuses = statuses;
        }
        self
    }

    // --- accounts ---

    pub fn account(mut self, account: AccountConfig) -> Self {
        self.config.accounts.push(account);
        self
    }

    /// Consume the builder and return the [`Config`] without validation.
    pub fn build(self) -> Config {
        self.config
    }

    /// Consume the builder, validate, and return the [`Config`] or errors.
    pub fn build_validated(self) -> Result<Config, Vec<ValidationError>> {
        let errors = self.config.validate();
        if errors.is_empty() {
            Ok(self.config)
        } else {
            Err(errors)
        }
    }

    fn provider_mut(&mut self, provider: Provider) -> Option<&mut ProviderConfig> {
        match provider {
            Provider::OneDrive => Some(&mut self.config.providers.onedrive),
            Provider::Facebook => Some(&mut self.config.providers.facebook),
            Provider::Dropbox => Some(&mut self.config.providers.dropbox),
            Provider::Google | Provider::Vk => None,
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
