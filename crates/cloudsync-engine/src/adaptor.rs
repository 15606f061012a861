//! Sync adaptor actor
//!
//! One [`SyncAdaptor`] runs per provider and data type. It is a tokio task
//! that exclusively owns its busy tracker, watchdog registrations and
//! per-account sessions; triggers arrive as commands from an
//! [`AdaptorHandle`] and request outcomes arrive on a completion channel.
//! Requests run as spawned tasks, but every piece of bookkeeping happens
//! on the adaptor task, so nothing inside an adaptor is locked and
//! adaptors share no mutable state.
//!
//! ## Pass lifecycle
//!
//! 1. `sync` is accepted only in the `Inactive` status.
//! 2. For each account a placeholder increment brackets the begin step:
//!    the removal snapshot and last-sync timestamp are read from the store,
//!    a token is obtained, and the strategy's initial requests are dispatched.
//! 3. Each completion is classified and applied; follow-ups are dispatched
//!    before the completing branch is decremented.
//! 4. When an account's count reaches zero, finalize runs. It may queue
//!    post-pass work (`MoreWork`); the count is re-checked after the call
//!    and the account only retires if it is still zero.
//! 5. When every account retired, the status becomes `Inactive`, or `Error`
//!    if anything failed.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use cloudsync_core::config::EngineConfig;
use cloudsync_core::domain::{
    AccountId, AdaptorStatus, ChangeSet, DataType, Provider, PurgeMode, StoreScope,
};
use cloudsync_core::ports::{
    BeginContext, FinalizeContext, IAccessTokenProvider, IHttpTransport, IResultStore,
    ISyncStrategy, PageRequest, RequestOutcome,
};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::driver;
use crate::removal::RemovalState;
use crate::session::{AccountSession, SessionStats};
use crate::tracker::{BusyTracker, Crossing};
use crate::watchdog::{RequestId, Watchdog};
use crate::SyncError;

/// Capacity of the command channel
const COMMAND_BUFFER: usize = 32;

// ============================================================================
// Settings
// ============================================================================

/// Engine settings for one adaptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptorSettings {
    /// Reply timeout for requests that do not set their own
    pub request_timeout: Duration,
}

impl Default for AdaptorSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&EngineConfig> for AdaptorSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

enum Command {
    Sync {
        data_type: String,
        accounts: Vec<AccountId>,
        reply: oneshot::Sender<Result<(), SyncError>>,
    },
    Purge {
        account: AccountId,
        mode: PurgeMode,
        reply: oneshot::Sender<Result<u64, SyncError>>,
    },
    Abort {
        reply: oneshot::Sender<usize>,
    },
    Reset {
        reply: oneshot::Sender<Result<(), SyncError>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

struct Completion {
    request_id: RequestId,
    request: PageRequest,
    outcome: RequestOutcome,
}

/// Result of a finalize call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// The account's writes were committed (or skipped); it may retire
    Done,
    /// Finalize dispatched post-pass requests; the account stays busy
    MoreWork,
}

/// Aggregate of one sync pass, logged when the pass settles
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassSummary {
    pub accounts: usize,
    pub failed_accounts: usize,
    pub stats: SessionStats,
    pub duration_ms: u64,
}

struct PassState {
    started: Instant,
    /// Held while accounts are still being begun, so the pass cannot settle early
    beginning: bool,
    failed: bool,
    summary: PassSummary,
}

impl PassState {
    fn new(accounts: usize) -> Self {
        Self {
            started: Instant::now(),
            beginning: true,
            failed: false,
            summary: PassSummary {
                accounts,
                ..PassSummary::default()
            },
        }
    }
}

// ============================================================================
// Handle
// ============================================================================

/// Outward trigger interface of a running adaptor
///
/// Cheap to clone; the adaptor stops when every handle is dropped or
/// [`AdaptorHandle::shutdown`] is called.
#[derive(Clone)]
pub struct AdaptorHandle {
    provider: Provider,
    data_type: DataType,
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<AdaptorStatus>,
}

impl AdaptorHandle {
    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Starts a pass for one account
    ///
    /// Returns once the account's initial requests are dispatched; use
    /// [`AdaptorHandle::wait_until_settled`] or [`AdaptorHandle::subscribe`]
    /// to follow the pass.
    ///
    /// # Errors
    /// `Rejected` unless the adaptor is `Inactive`; `UnsupportedDataType` if
    /// `data_type` is not this adaptor's.
    pub async fn sync(&self, data_type: &str, account: AccountId) -> Result<(), SyncError> {
        self.sync_accounts(data_type, &[account]).await
    }

    /// Starts one pass over several accounts, which then run concurrently
    pub async fn sync_accounts(
        &self,
        data_type: &str,
        accounts: &[AccountId],
    ) -> Result<(), SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Sync {
            data_type: data_type.to_string(),
            accounts: accounts.to_vec(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SyncError::AdaptorStopped)?
    }

    /// Removes every cached record of an account
    ///
    /// # Returns
    /// Number of records removed (including orphans for `CleanUpPurge`)
    pub async fn purge_data_for_old_account(
        &self,
        account: AccountId,
        mode: PurgeMode,
    ) -> Result<u64, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Purge {
            account,
            mode,
            reply,
        })
        .await?;
        rx.await.map_err(|_| SyncError::AdaptorStopped)?
    }

    /// Fires every outstanding request timer at once
    ///
    /// # Returns
    /// Number of outstanding requests that were expired
    pub async fn abort_sync(&self) -> Result<usize, SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Abort { reply }).await?;
        rx.await.map_err(|_| SyncError::AdaptorStopped)
    }

    /// Clears an `Error` status (or retries initialisation when `Invalid`)
    pub async fn reset(&self) -> Result<(), SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Reset { reply }).await?;
        rx.await.map_err(|_| SyncError::AdaptorStopped)?
    }

    /// Aborts outstanding requests and stops the adaptor task
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Shutdown { reply }).await?;
        rx.await.map_err(|_| SyncError::AdaptorStopped)
    }

    /// Current status
    pub fn status(&self) -> AdaptorStatus {
        *self.status.borrow()
    }

    /// Observable of status changes
    pub fn subscribe(&self) -> watch::Receiver<AdaptorStatus> {
        self.status.clone()
    }

    /// Waits until no pass is running and returns the resulting status
    pub async fn wait_until_settled(&self) -> Result<AdaptorStatus, SyncError> {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(AdaptorStatus::is_settled)
            .await
            .map_err(|_| SyncError::AdaptorStopped)?;
        Ok(*status)
    }

    async fn send(&self, command: Command) -> Result<(), SyncError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SyncError::AdaptorStopped)
    }
}

// ============================================================================
// Adaptor
// ============================================================================

/// The orchestration engine for one provider and data type
pub struct SyncAdaptor {
    strategy: Arc<dyn ISyncStrategy>,
    store: Arc<dyn IResultStore>,
    tokens: Arc<dyn IAccessTokenProvider>,
    transport: Arc<dyn IHttpTransport>,
    settings: AdaptorSettings,

    pub(crate) tracker: BusyTracker,
    pub(crate) watchdog: Watchdog,
    pub(crate) sessions: HashMap<AccountId, AccountSession>,
    pass: Option<PassState>,

    status: watch::Sender<AdaptorStatus>,
    commands: mpsc::Receiver<Command>,
    completions_tx: mpsc::UnboundedSender<Completion>,
    completions_rx: mpsc::UnboundedReceiver<Completion>,
}

impl SyncAdaptor {
    /// Starts the adaptor task and returns its handle
    ///
    /// The adaptor reports `Initializing` until the store is initialised,
    /// then `Inactive`, or `Invalid` if initialisation failed.
    pub fn spawn(
        strategy: Arc<dyn ISyncStrategy>,
        store: Arc<dyn IResultStore>,
        tokens: Arc<dyn IAccessTokenProvider>,
        transport: Arc<dyn IHttpTransport>,
        settings: AdaptorSettings,
    ) -> AdaptorHandle {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
        let (status_tx, status_rx) = watch::channel(AdaptorStatus::Initializing);
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();

        let handle = AdaptorHandle {
            provider: strategy.provider(),
            data_type: strategy.data_type(),
            commands: commands_tx,
            status: status_rx,
        };

        let adaptor = Self {
            strategy,
            store,
            tokens,
            transport,
            settings,
            tracker: BusyTracker::new(),
            watchdog: Watchdog::new(),
            sessions: HashMap::new(),
            pass: None,
            status: status_tx,
            commands: commands_rx,
            completions_tx,
            completions_rx,
        };
        tokio::spawn(adaptor.run());
        handle
    }

    pub(crate) fn scope(&self, account: AccountId) -> StoreScope {
        StoreScope::new(self.strategy.provider(), self.strategy.data_type(), account)
    }

    pub(crate) fn provider(&self) -> Provider {
        self.strategy.provider()
    }

    pub(crate) fn data_type(&self) -> DataType {
        self.strategy.data_type()
    }

    pub(crate) fn store(&self) -> &Arc<dyn IResultStore> {
        &self.store
    }

    pub(crate) fn current_status(&self) -> AdaptorStatus {
        *self.status.borrow()
    }

    pub(crate) fn set_status(&self, next: AdaptorStatus) {
        let previous = self.status.send_replace(next);
        if previous != next {
            info!(
                provider = %self.provider(),
                data_type = %self.data_type(),
                from = %previous,
                to = %next,
                "Adaptor status changed"
            );
        }
    }

    /// Main event loop
    async fn run(mut self) {
        match self.store.initialize().await {
            Ok(()) => self.set_status(AdaptorStatus::Inactive),
            Err(e) => {
                error!(
                    provider = %self.provider(),
                    data_type = %self.data_type(),
                    error = %e,
                    "Result store failed to initialise"
                );
                self.set_status(AdaptorStatus::Invalid);
            }
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown { reply }) => {
                        let expired = self.watchdog.expire_all();
                        info!(provider = %self.provider(), data_type = %self.data_type(), expired, "Adaptor shutting down");
                        let _ = reply.send(());
                        break;
                    }
                    Some(command) => self.handle_command(command).await,
                    None => {
                        debug!(provider = %self.provider(), "All handles dropped, adaptor stopping");
                        self.watchdog.expire_all();
                        break;
                    }
                },
                Some(completion) = self.completions_rx.recv() => {
                    self.handle_completion(completion).await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Sync {
                data_type,
                accounts,
                reply,
            } => {
                let result = self.start_pass(&data_type, accounts).await;
                let _ = reply.send(result);
            }
            Command::Purge {
                account,
                mode,
                reply,
            } => {
                let result = self.purge(account, mode).await;
                let _ = reply.send(result);
            }
            Command::Abort { reply } => {
                let _ = reply.send(self.abort());
            }
            Command::Reset { reply } => {
                let result = self.reset().await;
                let _ = reply.send(result);
            }
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    // ------------------------------------------------------------------------
    // Pass start
    // ------------------------------------------------------------------------

    #[tracing::instrument(skip(self, accounts), fields(provider = %self.provider()))]
    async fn start_pass(
        &mut self,
        data_type: &str,
        mut accounts: Vec<AccountId>,
    ) -> Result<(), SyncError> {
        let requested = DataType::from_str(data_type)
            .map_err(|_| SyncError::UnsupportedDataType(data_type.to_string()))?;
        if requested != self.data_type() {
            warn!(requested = %requested, "Sync rejected: data type not handled by this adaptor");
            return Err(SyncError::UnsupportedDataType(data_type.to_string()));
        }

        let status = self.current_status();
        if !status.accepts_sync() {
            warn!(%status, "Sync rejected: adaptor is not inactive");
            return Err(SyncError::Rejected(format!("adaptor is {status}")));
        }

        accounts.sort_unstable();
        accounts.dedup();
        if accounts.is_empty() {
            debug!("Sync requested for no accounts");
            return Ok(());
        }

        info!(accounts = accounts.len(), "Starting sync pass");
        self.pass = Some(PassState::new(accounts.len()));
        for account in accounts {
            self.begin_account(account).await;
        }
        if let Some(pass) = self.pass.as_mut() {
            pass.beginning = false;
        }
        self.settle_if_idle();
        Ok(())
    }

    /// Begins one account's pass under a placeholder increment
    async fn begin_account(&mut self, account: AccountId) {
        self.increment(account);
        let mut session = AccountSession::new(account);
        let scope = self.scope(account);

        match self.prepare_session(&mut session, &scope).await {
            Ok(()) => {
                let ctx = BeginContext {
                    account,
                    since: session.since,
                };
                let requests = self.strategy.begin_sync(&ctx);
                session.begun = true;
                debug!(%account, initial_requests = requests.len(), "Beginning account pass");
                self.sessions.insert(account, session);
                for request in requests {
                    self.dispatch(account, request);
                }
            }
            Err(e) => {
                error!(%account, error = %e, "Account pass failed before dispatch");
                session.fail(e);
                self.sessions.insert(account, session);
            }
        }

        self.decrement(account).await;
    }

    /// Reads the removal snapshot, the last-sync timestamp and the token
    async fn prepare_session(
        &self,
        session: &mut AccountSession,
        scope: &StoreScope,
    ) -> Result<(), SyncError> {
        let cached = self
            .store
            .query(scope)
            .await
            .map_err(|e| SyncError::CacheUnavailable(e.to_string()))?;
        session.since = self
            .store
            .last_sync_timestamp(scope)
            .await
            .map_err(|e| SyncError::CacheUnavailable(e.to_string()))?;
        session.removal = RemovalState::from_records(&cached);

        session.access_token = self
            .tokens
            .access_token(session.account)
            .await
            .map_err(|e| SyncError::CredentialsUnavailable {
                account: session.account,
                reason: e.to_string(),
            })?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Dispatch and completion
    // ------------------------------------------------------------------------

    /// Dispatches one guarded request; the increment happens before the spawn
    fn dispatch(&mut self, account: AccountId, request: PageRequest) {
        let Some(session) = self.sessions.get(&account) else {
            warn!(%account, "Dispatch without a session ignored");
            return;
        };
        let token = session.access_token.clone();

        self.increment(account);
        let timeout = request.timeout.unwrap_or(self.settings.request_timeout);
        let guard = self.watchdog.arm(account, timeout);
        let request_id = guard.id();
        let transport = Arc::clone(&self.transport);
        let completions = self.completions_tx.clone();

        debug!(
            %account,
            request_id,
            method = %request.http.method,
            url = %request.http.url,
            timeout_secs = timeout.as_secs(),
            "Dispatching request"
        );

        tokio::spawn(async move {
            let outcome = guard
                .watch(transport.execute(&request.http, &token, timeout))
                .await;
            // The adaptor may already be gone; its outcome no longer matters.
            let _ = completions.send(Completion {
                request_id,
                request,
                outcome,
            });
        });
    }

    async fn handle_completion(&mut self, completion: Completion) {
        let Completion {
            request_id,
            request,
            outcome,
        } = completion;

        let Some(account) = self.watchdog.disarm(request_id) else {
            debug!(request_id, "Dropping completion for a disarmed request");
            return;
        };
        let Some(session) = self.sessions.get_mut(&account) else {
            debug!(%account, request_id, "Dropping completion for a retired account");
            return;
        };

        let result = driver::classify(self.strategy.as_ref(), &request, outcome, account);
        match result {
            Ok(page) => {
                session.stats.requests_completed += 1;
                let effects = driver::apply_page(session, &request, page);
                debug!(
                    %account,
                    request_id,
                    observed = effects.observed,
                    staged = effects.staged,
                    follow_ups = effects.follow_ups.len(),
                    completed_listing = effects.completed_listing,
                    "Request completed"
                );
                for follow_up in effects.follow_ups {
                    self.dispatch(account, follow_up);
                }
            }
            Err(e) => {
                session.stats.requests_failed += 1;
                warn!(%account, request_id, url = %request.http.url, error = %e, "Request branch failed");
                session.fail(e.clone());
                if let Some(pass) = self.pass.as_mut() {
                    pass.failed = true;
                }
                if matches!(e, SyncError::CredentialsExpired(_)) {
                    self.tokens.report_expired(account).await;
                }
            }
        }

        self.decrement(account).await;
    }

    // ------------------------------------------------------------------------
    // Busy counting
    // ------------------------------------------------------------------------

    fn increment(&mut self, account: AccountId) {
        let count = self.tracker.increment(account);
        if count == 1 && self.current_status() != AdaptorStatus::Busy {
            self.set_status(AdaptorStatus::Busy);
        }
    }

    async fn decrement(&mut self, account: AccountId) {
        match self.tracker.decrement(account) {
            Ok(Crossing::StillBusy) => {}
            Ok(Crossing::ReachedZero) => {
                let outcome = self.finalize(account).await;
                // Finalize may have queued more work; only retire if still at zero.
                if outcome == FinalizeOutcome::MoreWork || self.tracker.count(account) > 0 {
                    debug!(%account, outstanding = self.tracker.count(account), "Finalize resumed the pass");
                    return;
                }
                self.retire(account);
            }
            Err(violation) => {
                error!(%account, error = %violation, "Busy count invariant violated, dropping account pass");
                self.drop_account(account);
                if let Some(pass) = self.pass.as_mut() {
                    pass.failed = true;
                    pass.summary.failed_accounts += 1;
                }
                self.settle_if_idle();
            }
        }
    }

    // ------------------------------------------------------------------------
    // Finalize
    // ------------------------------------------------------------------------

    /// Commits the account's pass, or queues post-pass work first
    #[tracing::instrument(skip(self), fields(provider = %self.provider(), data_type = %self.data_type()))]
    async fn finalize(&mut self, account: AccountId) -> FinalizeOutcome {
        let Some(session) = self.sessions.get_mut(&account) else {
            return FinalizeOutcome::Done;
        };

        if session.begun && !session.failed && !session.aborted && !session.post_pass_requested {
            session.post_pass_requested = true;
            let written = session.staged();
            let requests = self.strategy.finalize_requests(&FinalizeContext {
                account,
                written: &written,
            });
            if !requests.is_empty() {
                debug!(%account, post_pass = requests.len(), "Queuing post-pass requests");
                for request in requests {
                    self.dispatch(account, request);
                }
                return FinalizeOutcome::MoreWork;
            }
        }

        let Some(mut session) = self.sessions.remove(&account) else {
            return FinalizeOutcome::Done;
        };
        let failed = session.failed;

        if session.begun {
            let scope = self.scope(account);
            let removals = session.removal.scheduled_removals(failed);
            let upserts = session.take_staged();
            session.stats.records_written = upserts.len() as u64;
            session.stats.records_removed = removals.len() as u64;

            let committed = match self.store.commit(&scope, ChangeSet { upserts, removals }).await {
                Ok(()) => true,
                Err(e) => {
                    error!(%account, error = %e, "Commit failed");
                    session.fail(SyncError::CacheUnavailable(e.to_string()));
                    false
                }
            };

            // The timestamp only advances for clean, committed passes.
            if committed && !failed {
                if let Err(e) = self
                    .store
                    .set_last_sync_timestamp(&scope, session.started_at)
                    .await
                {
                    error!(%account, error = %e, "Failed to store last sync timestamp");
                    session.fail(SyncError::CacheUnavailable(e.to_string()));
                }
            }
        }

        if session.failed {
            warn!(%account, errors = %session.error_summary(), "Account pass had failures");
        }
        info!(
            %account,
            failed = session.failed,
            written = session.stats.records_written,
            removed = session.stats.records_removed,
            requests = session.stats.requests_completed,
            failed_requests = session.stats.requests_failed,
            "Account pass finalized"
        );
        if let Some(pass) = self.pass.as_mut() {
            pass.summary.stats.absorb(&session.stats);
            if session.failed {
                pass.failed = true;
                pass.summary.failed_accounts += 1;
            }
        }
        FinalizeOutcome::Done
    }

    fn retire(&mut self, account: AccountId) {
        self.tracker.forget(account);
        self.sessions.remove(&account);
        self.settle_if_idle();
    }

    /// Drops all state of an account without committing
    pub(crate) fn drop_account(&mut self, account: AccountId) -> bool {
        let had_session = self.sessions.remove(&account).is_some();
        let cancelled = self.watchdog.forget_account(account);
        self.tracker.forget(account);
        if had_session || cancelled > 0 {
            debug!(%account, cancelled, "Dropped account pass");
        }
        had_session
    }

    /// Moves to `Inactive` or `Error` once every account has retired
    pub(crate) fn settle_if_idle(&mut self) {
        let beginning = self.pass.as_ref().is_some_and(|p| p.beginning);
        if beginning || !self.sessions.is_empty() || !self.tracker.is_idle() {
            return;
        }
        let Some(mut pass) = self.pass.take() else {
            return;
        };
        pass.summary.duration_ms = pass.started.elapsed().as_millis() as u64;
        let summary = &pass.summary;
        info!(
            provider = %self.provider(),
            data_type = %self.data_type(),
            accounts = summary.accounts,
            failed_accounts = summary.failed_accounts,
            requests_completed = summary.stats.requests_completed,
            requests_failed = summary.stats.requests_failed,
            records_written = summary.stats.records_written,
            records_removed = summary.stats.records_removed,
            duration_ms = summary.duration_ms,
            "Sync pass finished"
        );
        self.set_status(if pass.failed {
            AdaptorStatus::Error
        } else {
            AdaptorStatus::Inactive
        });
    }

    // ------------------------------------------------------------------------
    // Abort and reset
    // ------------------------------------------------------------------------

    fn abort(&mut self) -> usize {
        for session in self.sessions.values_mut() {
            session.aborted = true;
        }
        let expired = self.watchdog.expire_all();
        info!(provider = %self.provider(), expired, "Sync aborted");
        expired
    }

    async fn reset(&mut self) -> Result<(), SyncError> {
        match self.current_status() {
            AdaptorStatus::Error => {
                self.set_status(AdaptorStatus::Inactive);
                Ok(())
            }
            AdaptorStatus::Inactive => Ok(()),
            AdaptorStatus::Invalid => match self.store.initialize().await {
                Ok(()) => {
                    self.set_status(AdaptorStatus::Inactive);
                    Ok(())
                }
                Err(e) => Err(SyncError::CacheUnavailable(e.to_string())),
            },
            status => Err(SyncError::Rejected(format!("cannot reset while {status}"))),
        }
    }
}
