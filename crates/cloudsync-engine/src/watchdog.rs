//! Reply-timeout watchdog
//!
//! Every guarded request is armed with a timer before dispatch. The request
//! future, its timer and its abort token race inside one task through
//! [`WatchGuard::watch`], which yields exactly one [`RequestOutcome`]. A
//! timeout or an abort becomes a synthesized network error that goes
//! through the same completion path as a real one.
//!
//! Registrations are disarmed on the adaptor when an outcome arrives; a
//! second disarm of the same request returns `None`, so a completion can
//! never be counted twice.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use cloudsync_core::domain::AccountId;
use cloudsync_core::ports::{NetworkFailure, RequestOutcome};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identifier of one dispatched request
pub type RequestId = u64;

#[derive(Debug)]
struct Armed {
    account: AccountId,
    token: CancellationToken,
}

/// Timer registrations for one adaptor's outstanding requests
#[derive(Debug)]
pub struct Watchdog {
    abort: CancellationToken,
    next_id: RequestId,
    armed: HashMap<RequestId, Armed>,
}

/// Handle moved into the request task
#[derive(Debug)]
pub struct WatchGuard {
    id: RequestId,
    timeout: Duration,
    token: CancellationToken,
}

impl Watchdog {
    pub fn new() -> Self {
        Self {
            abort: CancellationToken::new(),
            next_id: 1,
            armed: HashMap::new(),
        }
    }

    /// Registers a timer for a request about to be dispatched
    ///
    /// # Arguments
    /// * `account` - Account the request belongs to
    /// * `timeout` - How long to wait for a reply
    pub fn arm(&mut self, account: AccountId, timeout: Duration) -> WatchGuard {
        let id = self.next_id;
        self.next_id += 1;
        let token = self.abort.child_token();
        self.armed.insert(
            id,
            Armed {
                account,
                token: token.clone(),
            },
        );
        WatchGuard { id, timeout, token }
    }

    /// Removes a registration when its outcome arrives
    ///
    /// Returns the owning account, or `None` if the registration is gone
    /// (already disarmed, or its account was dropped).
    pub fn disarm(&mut self, id: RequestId) -> Option<AccountId> {
        self.armed.remove(&id).map(|armed| armed.account)
    }

    /// Fires every armed timer immediately
    ///
    /// Registrations stay armed until their synthesized outcomes come back.
    pub fn expire_all(&mut self) -> usize {
        let fired = self.armed.len();
        self.abort.cancel();
        self.abort = CancellationToken::new();
        debug!(fired, "Expired all outstanding requests");
        fired
    }

    /// Drops every registration of an account and stops its requests
    ///
    /// Outcomes for the dropped requests are ignored when they arrive.
    pub fn forget_account(&mut self, account: AccountId) -> usize {
        let before = self.armed.len();
        self.armed.retain(|_, armed| {
            if armed.account == account {
                armed.token.cancel();
                false
            } else {
                true
            }
        });
        before - self.armed.len()
    }

    #[cfg(test)]
    fn armed_for(&self, account: AccountId) -> usize {
        self.armed.values().filter(|a| a.account == account).count()
    }

    #[cfg(test)]
    fn armed_total(&self) -> usize {
        self.armed.len()
    }
}

impl Default for Watchdog {
    fn default() -> Self {
        Self::new()
    }
}

impl WatchGuard {
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Races the request against its timer and abort token
    ///
    /// The losing branches are dropped, so the transport is told to stop
    /// and anything it would emit later is discarded.
    pub async fn watch<F>(self, request: F) -> RequestOutcome
    where
        F: Future<Output = RequestOutcome>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => RequestOutcome::NetworkError(NetworkFailure::Aborted),
            outcome = request => outcome,
            _ = tokio::time::sleep(self.timeout) => RequestOutcome::NetworkError(NetworkFailure::TimedOut),
        }
    }
}
