//! Coalesced recovery from rejected access tokens.
//!
//! When the server answers 401 to a request that carried an access token,
//! the client asks the [`RefreshCoordinator`] for a replacement. The
//! coordinator runs at most one refresh at a time: the first caller spawns
//! it, every caller that arrives while it runs waits on the same outcome,
//! and a caller whose stale token has already been replaced gets the new
//! token without any network call.
//!
//! ```text
//!            401                      refresh ok / other failure
//!   Idle ───────────▶ RefreshInFlight ──────────────────────────▶ Idle
//!    ▲                      │
//!    │ install (login)      │ refresh rejected: store cleared
//!    └──────── Failed ◀─────┘
//! ```
//!
//! The refresh runs on its own task, so a caller that gives up waiting does
//! not cancel it for the others.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{Instrument, debug, info, info_span, warn};

use tubekit_core::error::{AuthError, TransportError};
use tubekit_core::{AccessToken, Error, RefreshToken, Result, TokenPair, TokenStore};

/// Exchanges a refresh token for a new pair.
#[async_trait]
pub trait Refresher: Send + Sync + 'static {
    /// Call the refresh endpoint. Must never attempt recovery itself.
    ///
    /// A 401 or 403 from the server ends the session; any other error keeps
    /// the stored tokens and is handed to the waiting requests.
    async fn refresh(&self, token: &RefreshToken) -> Result<TokenPair>;

    /// Called after a new pair has been stored.
    fn session_refreshed(&self) {}

    /// Called after a rejected refresh has cleared the store, before any
    /// waiting request is released.
    fn session_expired(&self) {}
}

/// Observable coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    RefreshInFlight,
    /// The refresh token was rejected. Only a new login leaves this state.
    Failed,
}

#[derive(Debug, Clone)]
enum Outcome {
    Refreshed(AccessToken),
    /// The session was replaced (login or logout) while the refresh ran.
    Replaced(Option<AccessToken>),
    Rejected,
    Unavailable(Error),
}

enum Phase {
    Idle,
    InFlight(watch::Receiver<Option<Outcome>>),
    Failed,
}

struct State {
    phase: Phase,
    /// Bumped on every login and logout so a refresh started for an earlier session
    /// cannot overwrite the tokens of a later one.
    epoch: u64,
}

struct CoordinatorInner {
    store: Arc<dyn TokenStore>,
    state: Mutex<State>,
}

/// Serializes token refreshes for everything sharing one token store.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl RefreshCoordinator {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                store,
                state: Mutex::new(State {
                    phase: Phase::Idle,
                    epoch: 0,
                }),
            }),
        }
    }

    pub fn state(&self) -> RefreshState {
        match self.lock().phase {
            Phase::Idle => RefreshState::Idle,
            Phase::InFlight(_) => RefreshState::RefreshInFlight,
            Phase::Failed => RefreshState::Failed,
        }
    }

    /// Store the pair of a new session and return to `Idle`.
    ///
    /// The write happens under the state lock, so no refresh can start
    /// against the previous pair once this returns, and one still running
    /// for the previous session has its result discarded.
    pub fn install(&self, pair: TokenPair) -> Result<()> {
        let _state = self.begin_session();
        self.inner.store.save(pair)
    }

    /// Clear the store and return to `Idle`, discarding any running refresh.
    pub fn end(&self) -> Result<()> {
        let _state = self.begin_session();
        self.inner.store.clear()
    }

    /// Bump the epoch and return to `Idle`, keeping the lock held for the
    /// store write that follows.
    fn begin_session(&self) -> MutexGuard<'_, State> {
        let mut state = self.lock();
        state.epoch += 1;
        state.phase = Phase::Idle;
        state
    }

    /// Obtain an access token to replace `stale`, which the server rejected.
    ///
    /// # Errors
    ///
    /// - [`AuthError::SessionExpired`] if the refresh token was rejected,
    ///   now or by an earlier refresh
    /// - [`AuthError::NotAuthenticated`] if no tokens are stored
    /// - the transport error if the refresh call could not reach the server
    pub async fn recover<R: Refresher>(
        &self,
        stale: &AccessToken,
        refresher: R,
    ) -> Result<AccessToken> {
        let mut rx = {
            let mut state = self.lock();
            match &state.phase {
                Phase::Failed => {
                    debug!("Session already expired");
                    return Err(AuthError::SessionExpired.into());
                }
                Phase::InFlight(rx) => {
                    debug!("Joining in-flight refresh");
                    rx.clone()
                }
                Phase::Idle => {
                    let Some(pair) = self.inner.store.pair() else {
                        return Err(AuthError::NotAuthenticated.into());
                    };
                    if &pair.access != stale {
                        debug!("Access token already replaced, skipping refresh");
                        return Ok(pair.access);
                    }

                    let (tx, rx) = watch::channel(None);
                    state.phase = Phase::InFlight(rx.clone());
                    self.spawn_refresh(state.epoch, pair.refresh, refresher, tx);
                    rx
                }
            }
        };

        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|outcome| (*outcome).clone());

        match outcome {
            Some(Outcome::Refreshed(token)) | Some(Outcome::Replaced(Some(token))) => Ok(token),
            Some(Outcome::Replaced(None)) => Err(AuthError::NotAuthenticated.into()),
            Some(Outcome::Rejected) => Err(AuthError::SessionExpired.into()),
            Some(Outcome::Unavailable(err)) => Err(err),
            None => Err(TransportError::Http {
                message: "token refresh ended without an outcome".to_string(),
            }
            .into()),
        }
    }

    fn spawn_refresh<R: Refresher>(
        &self,
        epoch: u64,
        token: RefreshToken,
        refresher: R,
        tx: watch::Sender<Option<Outcome>>,
    ) {
        let coordinator = self.clone();
        let task = async move {
            let mut guard = InFlightGuard {
                coordinator: coordinator.clone(),
                epoch,
                armed: true,
            };

            info!("Refreshing access token");
            let result = refresher.refresh(&token).await;
            let outcome = coordinator.settle(epoch, result);
            guard.armed = false;

            match &outcome {
                Outcome::Refreshed(_) => refresher.session_refreshed(),
                Outcome::Rejected => refresher.session_expired(),
                Outcome::Replaced(_) | Outcome::Unavailable(_) => {}
            }
            tx.send_replace(Some(outcome));
        };

        tokio::spawn(task.instrument(info_span!("token_refresh", epoch)));
    }

    /// Apply a refresh result to the store and state machine.
    fn settle(&self, epoch: u64, result: Result<TokenPair>) -> Outcome {
        let store = &self.inner.store;
        let mut state = self.lock();

        if state.epoch != epoch {
            debug!("Session replaced during refresh, discarding result");
            return Outcome::Replaced(store.pair().map(|pair| pair.access));
        }

        let outcome = match result {
            Ok(pair) => match store.save(pair.clone()) {
                Ok(()) => {
                    debug!("Refreshed tokens stored");
                    Outcome::Refreshed(pair.access)
                }
                Err(err) => {
                    warn!(error = %err, "Failed to store refreshed tokens");
                    Outcome::Unavailable(err)
                }
            },
            Err(err) if !ends_session(&err) => {
                warn!(error = %err, "Refresh request failed, keeping session");
                Outcome::Unavailable(err)
            }
            Err(err) => {
                warn!(error = %err, "Refresh rejected, ending session");
                if let Err(err) = store.clear() {
                    warn!(error = %err, "Failed to clear token store");
                }
                Outcome::Rejected
            }
        };

        state.phase = match outcome {
            Outcome::Rejected => Phase::Failed,
            _ => Phase::Idle,
        };
        outcome
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Only an authorization failure on the refresh call itself is terminal.
fn ends_session(err: &Error) -> bool {
    matches!(err, Error::Protocol(err) if matches!(err.status, 401 | 403))
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("state", &self.state())
            .finish()
    }
}

/// Returns the coordinator to `Idle` if the refresh task dies mid-flight.
struct InFlightGuard {
    coordinator: RefreshCoordinator,
    epoch: u64,
    armed: bool,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.coordinator.lock();
        if state.epoch == self.epoch {
            warn!("Token refresh aborted");
            state.phase = Phase::Idle;
        }
    }
}
