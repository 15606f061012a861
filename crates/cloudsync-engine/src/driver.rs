//! Pagination and continuation driver
//!
//! Turns a request outcome into a parsed page (or a branch error) and
//! applies the page to the account's session: every entity is recorded as
//! observed and staged when it changed, the container's listing is marked
//! complete on its last page, and the follow-up requests are returned for
//! the adaptor to dispatch before it closes the current branch.

use cloudsync_core::domain::AccountId;
use cloudsync_core::ports::{ISyncStrategy, PageRequest, ParsedPage, RequestOutcome};
use tracing::{debug, trace, warn};

use crate::session::AccountSession;
use crate::SyncError;

/// HTTP status meaning the access token was rejected
const UNAUTHORIZED: u16 = 401;

/// What applying one page did
#[derive(Debug, Default)]
pub struct PageEffects {
    /// Next page and dependent requests, to dispatch on the same account
    pub follow_ups: Vec<PageRequest>,
    /// Entities seen on the page
    pub observed: usize,
    /// Entities staged for writing
    pub staged: usize,
    /// Whether the page completed its container's listing
    pub completed_listing: bool,
}

/// Classifies an outcome for the branch that issued `request`
///
/// Benign statuses are decided by the strategy and finish the branch as
/// an empty final page, unless they answer a listing continuation, which
/// fails the branch instead. A 401 is reported as expired credentials.
pub fn classify(
    strategy: &dyn ISyncStrategy,
    request: &PageRequest,
    outcome: RequestOutcome,
    account: AccountId,
) -> Result<ParsedPage, SyncError> {
    match outcome {
        RequestOutcome::Success { body, .. } => strategy
            .parse_page(request, &body)
            .map_err(|e| SyncError::Parse(e.to_string())),
        RequestOutcome::ProtocolError { status, .. } if status == UNAUTHORIZED => {
            Err(SyncError::CredentialsExpired(account))
        }
        RequestOutcome::ProtocolError { status, .. } => {
            if !strategy.treats_as_success(request, status) {
                return Err(SyncError::Protocol { status });
            }
            // Earlier pages were read, later ones were not; closing the
            // listing here would remove whatever sat on the unread pages.
            if request.kind.is_listing() && request.is_continuation() {
                warn!(
                    status,
                    page = request.page,
                    url = %request.http.url,
                    "Benign status on a continuation page, failing the branch"
                );
                return Err(SyncError::Protocol { status });
            }
            debug!(status, url = %request.http.url, "Benign status treated as final page");
            Ok(ParsedPage::empty())
        }
        RequestOutcome::NetworkError(failure) => Err(SyncError::Network(failure)),
    }
}

/// Applies a parsed page to the session
///
/// Entities are recorded before any follow-up is returned, so page N+1 of a
/// branch is never dispatched before page N is observed.
pub fn apply_page(
    session: &mut AccountSession,
    request: &PageRequest,
    page: ParsedPage,
) -> PageEffects {
    let mut effects = PageEffects::default();
    let is_last = page.is_last();

    for remote in page.records {
        effects.observed += 1;
        session
            .removal
            .record_observed(&remote.container, &remote.entity);

        let changed = session.removal.is_changed(
            &remote.container,
            &remote.entity,
            remote.version.as_deref(),
        );
        if changed || session.is_staged(&remote.container, &remote.entity) {
            trace!(container = %remote.container, entity = %remote.entity, "Staging record");
            session.stage(remote.into_cache_record());
            effects.staged += 1;
        }
    }

    if request.kind.is_listing() && is_last {
        session.removal.mark_complete(&request.container);
        effects.completed_listing = true;
    }

    if session.aborted {
        return effects;
    }
    effects.follow_ups.extend(page.next_page);
    effects.follow_ups.extend(page.dependents);
    effects
}
