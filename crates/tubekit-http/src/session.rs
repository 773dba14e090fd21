//! Who is logged in, and the operations that change it.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use reqwest::Method;
use tokio::sync::{Mutex, broadcast, watch};
use tracing::{debug, info, instrument, warn};

use tubekit_core::error::AuthError;
use tubekit_core::{
    Credentials, Error, LogoutReason, Navigator, Result, TokenKind, TokenPair, User,
};

use crate::client::{ApiClient, SessionEvent};
use crate::endpoints::{IdentityResponse, LoginRequest, LoginResponse};
use crate::request::{ApiRequest, Auth};

/// Application-wide session state layered over an [`ApiClient`].
///
/// Holds the identity of the logged-in user and a readiness flag that is
/// false until [`bootstrap`](Session::bootstrap) has settled whether a
/// stored session is still valid. Cloning shares the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    client: ApiClient,
    navigator: Arc<dyn Navigator>,
    identity: RwLock<Option<User>>,
    ready: watch::Sender<bool>,
    bootstrap: Mutex<()>,
}

impl SessionInner {
    fn set_identity(&self, user: Option<User>) {
        *self
            .identity
            .write()
            .unwrap_or_else(PoisonError::into_inner) = user;
    }

    fn expire(&self) {
        self.set_identity(None);
        self.navigator.to_login(LogoutReason::Expired);
    }
}

impl Session {
    /// Create the session and hook it to `client`'s expiry notifications.
    pub fn new(client: ApiClient, navigator: Arc<dyn Navigator>) -> Self {
        let (ready, _) = watch::channel(false);
        let inner = Arc::new(SessionInner {
            client,
            navigator,
            identity: RwLock::new(None),
            ready,
            bootstrap: Mutex::new(()),
        });

        let weak = Arc::downgrade(&inner);
        inner.client.on_session_expired(move || {
            if let Some(inner) = weak.upgrade() {
                inner.expire();
            }
        });

        Self { inner }
    }

    pub fn client(&self) -> &ApiClient {
        &self.inner.client
    }

    /// Restore a stored session, once.
    ///
    /// With no stored access token this makes no network call. Otherwise
    /// the identity endpoint is queried: success populates the identity, a
    /// 401 or 403 clears the stored tokens, and any other failure (network,
    /// 5xx) keeps them for a later attempt. The session is ready afterwards in every case.
    #[instrument(skip(self))]
    pub async fn bootstrap(&self) -> Option<User> {
        let _guard = self.inner.bootstrap.lock().await;
        if self.is_ready() {
            return self.identity();
        }

        if self.inner.client.store().get(TokenKind::Access).is_none() {
            debug!("No stored session");
        } else {
            match self.fetch_identity().await {
                Ok(user) => {
                    info!(user = %user.username, "Session restored");
                    self.inner.set_identity(Some(user));
                }
                Err(err) if is_rejection(&err) => {
                    info!(error = %err, "Stored session rejected");
                    if let Err(err) = self.inner.client.refresh_coordinator().end() {
                        warn!(error = %err, "Failed to clear token store");
                    }
                    self.inner.set_identity(None);
                }
                Err(err) => {
                    warn!(error = %err, "Could not verify stored session, keeping tokens");
                }
            }
        }

        self.inner.ready.send_replace(true);
        self.identity()
    }

    /// Log in with `credentials` and start a new session.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidCredentials`] if the server answers 401; other
    /// failures are returned as-is and leave any previous session untouched.
    #[instrument(skip_all, fields(identifier = %credentials.identifier()))]
    pub async fn login(&self, credentials: Credentials) -> Result<User> {
        let body = serde_json::to_value(LoginRequest {
            identifier: credentials.identifier(),
            password: credentials.password(),
        })?;
        let request = ApiRequest::new(Method::POST, self.inner.client.config().endpoints.login.clone())
            .body(Some(body))
            .auth(Auth::Anonymous);

        let response = match self.inner.client.execute(request).await {
            Ok(response) => response,
            Err(Error::Protocol(err)) if err.is_unauthorized() => {
                let reason = err.message.unwrap_or_else(|| "rejected by server".to_string());
                return Err(AuthError::InvalidCredentials(reason).into());
            }
            Err(err) => return Err(err),
        };
        let login: LoginResponse = response.json()?;

        self.establish(
            TokenPair::new(login.access_token, login.refresh_token),
            login.user.clone(),
        )?;
        info!(user = %login.user.username, "Logged in");
        Ok(login.user)
    }

    /// Install a token pair and identity obtained elsewhere (e.g. signup).
    pub fn establish(&self, pair: TokenPair, user: User) -> Result<()> {
        let client = &self.inner.client;
        client.refresh_coordinator().install(pair)?;
        self.inner.set_identity(Some(user));
        self.inner.ready.send_replace(true);
        client.emit(SessionEvent::LoggedIn);
        Ok(())
    }

    /// End the session.
    ///
    /// The server is told on a best-effort basis; local state is cleared
    /// whatever it answers. Calling this while logged out is harmless.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        let client = &self.inner.client;

        if client.store().get(TokenKind::Access).is_some() {
            let request =
                ApiRequest::new(Method::POST, client.config().endpoints.logout.clone())
                    .unrecoverable();
            if let Err(err) = client.send_once(&request).await {
                warn!(error = %err, "Server logout failed, clearing local session anyway");
            }
        }

        let cleared = client.refresh_coordinator().end();
        self.inner.set_identity(None);

        info!("Logged out");
        client.emit(SessionEvent::LoggedOut);
        self.inner.navigator.to_login(LogoutReason::Requested);
        cleared
    }

    /// Re-fetch the identity of the current session.
    pub async fn reload_identity(&self) -> Result<User> {
        if self.inner.client.store().get(TokenKind::Access).is_none() {
            return Err(AuthError::NotAuthenticated.into());
        }
        let user = self.fetch_identity().await?;
        self.inner.set_identity(Some(user.clone()));
        Ok(user)
    }

    async fn fetch_identity(&self) -> Result<User> {
        let path = self.inner.client.config().endpoints.identity.clone();
        let response = self
            .inner
            .client
            .execute(ApiRequest::new(Method::GET, path))
            .await?;
        Ok(response.json::<IdentityResponse>()?.into_user())
    }

    pub fn identity(&self) -> Option<User> {
        self.inner
            .identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner
            .identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub fn is_verified(&self) -> bool {
        self.identity().is_some_and(|user| user.is_verified())
    }

    pub fn is_admin(&self) -> bool {
        self.identity().is_some_and(|user| user.is_admin())
    }

    /// True once bootstrap (or a login) has settled the session state.
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.borrow()
    }

    /// Wait until the session is ready.
    pub async fn wait_ready(&self) {
        let mut rx = self.inner.ready.subscribe();
        // The sender lives as long as `self`
        let _ = rx.wait_for(|ready| *ready).await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.client.subscribe()
    }
}

fn is_rejection(err: &Error) -> bool {
    match err {
        Error::Auth(_) => true,
        Error::Protocol(err) => matches!(err.status, 401 | 403),
        _ => false,
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("identity", &self.identity().map(|user| user.username))
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tubekit_core::{ApiBaseUrl, NoopNavigator};
    use tubekit_store::MemoryTokenStore;

    use crate::ClientConfig;

    fn session(store: MemoryTokenStore) -> Session {
        // Nothing listens on port 9; these tests never reach the network
        let config = ClientConfig::new(ApiBaseUrl::new("http://localhost:9").unwrap());
        let client = ApiClient::new(config, Arc::new(store)).unwrap();
        Session::new(client, Arc::new(NoopNavigator))
    }

    fn user(role: &str) -> User {
        serde_json::from_value(serde_json::json!({
            "id": "u1", "username": "alice", "role": role, "isVerified": true
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn bootstrap_without_tokens_is_ready_and_anonymous() {
        let session = session(MemoryTokenStore::new());
        assert!(!session.is_ready());

        assert!(session.bootstrap().await.is_none());
        assert!(session.is_ready());
        assert!(!session.is_authenticated());
        session.wait_ready().await;
    }

    #[tokio::test]
    async fn establish_sets_identity_and_tokens() {
        let session = session(MemoryTokenStore::new());
        let mut events = session.subscribe();

        session
            .establish(TokenPair::new("a", "r"), user("admin"))
            .unwrap();

        assert!(session.is_ready());
        assert!(session.is_admin());
        assert!(session.is_verified());
        assert_eq!(
            session.client().store().get(TokenKind::Access).as_deref(),
            Some("a")
        );
        assert_eq!(events.try_recv().unwrap(), SessionEvent::LoggedIn);
    }

    #[tokio::test]
    async fn logout_without_tokens_is_local_and_idempotent() {
        let session = session(MemoryTokenStore::new());
        session.logout().await.unwrap();
        session.logout().await.unwrap();
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn reload_identity_requires_tokens() {
        let session = session(MemoryTokenStore::new());
        let err = session.reload_identity().await.unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::NotAuthenticated)));
    }
}
