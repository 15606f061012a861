//! cloudsync Daemon - Background synchronization service
//!
//! This binary runs as a user service and handles:
//! - One sync adaptor per configured (provider, data type)
//! - Periodic passes over every configured account
//! - Graceful shutdown on SIGTERM/SIGINT
//!
//! # Architecture
//!
//! The daemon opens the shared result cache, spawns the adaptors and then
//! enters a loop that triggers a pass on every adaptor at each poll
//! interval. The loop is controlled by a `CancellationToken` that is
//! triggered on receipt of SIGTERM or SIGINT; outstanding requests are
//! aborted before the adaptors stop.

mod tokens;

use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use cloudsync_cache::{pool::DatabasePool, SqliteResultStore};
use cloudsync_core::config::{AccountConfig, Config, LoggingConfig};
use cloudsync_core::domain::{AccountId, AdaptorStatus, DataType, Provider};
use cloudsync_engine::{AdaptorHandle, AdaptorSettings, SyncAdaptor, SyncError};
use cloudsync_remote::{strategy_for, HttpClient};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::tokens::EnvTokenProvider;

/// Environment variable overriding the configuration file location
const CONFIG_ENV: &str = "CLOUDSYNC_CONFIG";

// ============================================================================
// Pass planning
// ============================================================================

/// Accounts synchronized together by one adaptor
#[derive(Debug, Clone, PartialEq, Eq)]
struct SyncPlan {
    provider: Provider,
    data_type: DataType,
    accounts: Vec<AccountId>,
}

/// Groups the configured accounts by (provider, data type)
///
/// Plans keep the order in which their first account was configured.
fn plan_passes(accounts: &[AccountConfig]) -> Vec<SyncPlan> {
    let mut plans: Vec<SyncPlan> = Vec::new();
    for account in accounts {
        for &data_type in &account.data_types {
            match plans
                .iter_mut()
                .find(|p| p.provider == account.provider && p.data_type == data_type)
            {
                Some(plan) => {
                    if !plan.accounts.contains(&account.id) {
                        plan.accounts.push(account.id);
                    }
                }
                None => plans.push(SyncPlan {
                    provider: account.provider,
                    data_type,
                    accounts: vec![account.id],
                }),
            }
        }
    }
    plans
}

// ============================================================================
// DaemonService
// ============================================================================

struct ScheduledAdaptor {
    handle: AdaptorHandle,
    accounts: Vec<AccountId>,
}

/// Main daemon service that owns the adaptors and drives their passes
struct DaemonService {
    config: Config,
    adaptors: Vec<ScheduledAdaptor>,
    /// Token for signalling graceful shutdown to all async tasks
    shutdown: CancellationToken,
}

impl DaemonService {
    /// Opens the cache and spawns one adaptor per sync plan
    ///
    /// Plans without a strategy are logged and skipped.
    async fn new(config: Config, shutdown: CancellationToken) -> Result<Self> {
        let db_pool = DatabasePool::new(&config.cache.path)
            .await
            .context("Failed to open cache database")?;
        let store = Arc::new(SqliteResultStore::new(db_pool.pool().clone()));
        let transport = Arc::new(HttpClient::new());
        let settings = AdaptorSettings::from(&config.engine);

        let mut adaptors = Vec::new();
        for plan in plan_passes(&config.accounts) {
            let strategy = match strategy_for(&config, plan.provider, plan.data_type) {
                Ok(strategy) => strategy,
                Err(e) => {
                    warn!(
                        provider = %plan.provider,
                        data_type = %plan.data_type,
                        error = %e,
                        "Skipping accounts without a sync strategy"
                    );
                    continue;
                }
            };
            let tokens = Arc::new(EnvTokenProvider::for_provider(
                &config.accounts,
                plan.provider,
            ));
            let handle = SyncAdaptor::spawn(
                strategy,
                store.clone(),
                tokens,
                transport.clone(),
                settings,
            );
            info!(
                provider = %plan.provider,
                data_type = %plan.data_type,
                accounts = plan.accounts.len(),
                "Adaptor started"
            );
            adaptors.push(ScheduledAdaptor {
                handle,
                accounts: plan.accounts,
            });
        }

        Ok(Self {
            config,
            adaptors,
            shutdown,
        })
    }

    /// Runs passes at every poll interval until shutdown
    async fn run(&self) -> Result<()> {
        if self.adaptors.is_empty() {
            warn!("No accounts to synchronize; add accounts to the configuration");
        }

        let poll = self.config.engine.poll_interval();
        info!(poll_interval_secs = poll.as_secs(), "Starting sync loop");

        let mut interval = tokio::time::interval(poll);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => self.run_cycle().await,
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.stop().await;
        info!("Sync loop terminated");
        Ok(())
    }

    /// Triggers a pass on every adaptor, then waits for all of them to settle
    async fn run_cycle(&self) {
        let mut started = Vec::new();

        for adaptor in &self.adaptors {
            let handle = &adaptor.handle;
            if matches!(handle.status(), AdaptorStatus::Error | AdaptorStatus::Invalid) {
                if let Err(e) = handle.reset().await {
                    warn!(
                        provider = %handle.provider(),
                        data_type = %handle.data_type(),
                        error = %e,
                        "Adaptor could not be reset; skipping this cycle"
                    );
                    continue;
                }
            }

            match handle
                .sync_accounts(handle.data_type().as_str(), &adaptor.accounts)
                .await
            {
                Ok(()) => started.push(handle),
                Err(SyncError::Rejected(reason)) => {
                    debug!(
                        provider = %handle.provider(),
                        data_type = %handle.data_type(),
                        %reason,
                        "Previous pass still running"
                    );
                }
                Err(e) => {
                    error!(
                        provider = %handle.provider(),
                        data_type = %handle.data_type(),
                        error = %e,
                        "Failed to start sync pass"
                    );
                }
            }
        }

        for handle in started {
            tokio::select! {
                settled = handle.wait_until_settled() => match settled {
                    Ok(status) => info!(
                        provider = %handle.provider(),
                        data_type = %handle.data_type(),
                        %status,
                        "Sync pass settled"
                    ),
                    Err(e) => error!(
                        provider = %handle.provider(),
                        data_type = %handle.data_type(),
                        error = %e,
                        "Adaptor stopped during pass"
                    ),
                },
                _ = self.shutdown.cancelled() => return,
            }
        }
    }

    /// Aborts outstanding requests and stops every adaptor
    async fn stop(&self) {
        for adaptor in &self.adaptors {
            let handle = &adaptor.handle;
            match handle.abort_sync().await {
                Ok(0) => {}
                Ok(aborted) => info!(
                    provider = %handle.provider(),
                    data_type = %handle.data_type(),
                    aborted,
                    "Outstanding requests aborted"
                ),
                Err(e) => warn!(error = %e, "Abort failed"),
            }
            if let Err(e) = handle.shutdown().await {
                warn!(error = %e, "Adaptor shutdown failed");
            }
        }
    }
}

// ============================================================================
// Graceful shutdown signal handler
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }

    token.cancel();
}

// ============================================================================
// Main entry point
// ============================================================================

/// Installs the global subscriber; `RUST_LOG` overrides `logging.level`
fn init_tracing(logging: &LoggingConfig) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = config_path();
    let config = Config::load_or_default(&config_path);

    init_tracing(&config.logging);
    info!(config_path = %config_path.display(), "cloudsync daemon starting (cloudsyncd)");

    let errors = config.validate();
    if !errors.is_empty() {
        for e in &errors {
            error!(field = %e.field, "Invalid configuration: {}", e.message);
        }
        bail!("configuration has {} error(s)", errors.len());
    }

    let shutdown_token = CancellationToken::new();

    let signal_token = shutdown_token.clone();
    tokio::spawn(async move {
        shutdown_signal(signal_token).await;
    });

    let service = DaemonService::new(config, shutdown_token.clone()).await?;
    let result = service.run().await;

    match &result {
        Ok(()) => info!("cloudsync daemon shut down gracefully"),
        Err(e) => error!(error = %e, "cloudsync daemon exiting with error"),
    }

    result
}

// ============================================================================
// Tests
// ============================================================================
