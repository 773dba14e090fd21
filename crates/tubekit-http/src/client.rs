//! The shared API client.

use std::fmt;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tracing::{debug, info, instrument, trace};

use tubekit_core::error::{AuthError, TransportError};
use tubekit_core::{AccessToken, Error, RefreshToken, Result, TokenPair, TokenStore};

use crate::cancel::CancelSignal;
use crate::config::ClientConfig;
use crate::endpoints::RefreshResponse;
use crate::error::{protocol_error, transport_error};
use crate::interceptor;
use crate::refresh::{RefreshCoordinator, Refresher};
use crate::request::{ApiRequest, ApiResponse, Auth, RequestOptions};

/// Session lifecycle notifications, delivered to [`ApiClient::subscribe`]rs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    LoggedIn,
    Refreshed,
    /// The refresh token was rejected and the tokens were cleared.
    Expired,
    LoggedOut,
}

type ExpiryHook = Box<dyn Fn() + Send + Sync>;

/// HTTP client shared by everything that talks to the API.
///
/// Cloning is cheap; clones share the connection pool, the token store and
/// the refresh coordinator.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    config: ClientConfig,
    store: Arc<dyn TokenStore>,
    refresh: RefreshCoordinator,
    expiry_hooks: RwLock<Vec<ExpiryHook>>,
    events: broadcast::Sender<SessionEvent>,
}

impl ApiClient {
    /// Create a client for `config.base_url` backed by `store`.
    pub fn new(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .cookie_store(true)
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| TransportError::Http {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        let (events, _) = broadcast::channel(16);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                refresh: RefreshCoordinator::new(Arc::clone(&store)),
                store,
                config,
                expiry_hooks: RwLock::default(),
                events,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    pub(crate) fn store(&self) -> &dyn TokenStore {
        &*self.inner.store
    }

    /// Returns true if an access token is currently stored.
    pub fn has_session(&self) -> bool {
        self.inner.store.pair().is_some()
    }

    /// Register a callback run once each time a refresh is rejected, after
    /// the store has been cleared.
    pub fn on_session_expired(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.inner
            .expiry_hooks
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    /// Send a request with the current session.
    ///
    /// `path` is relative to the configured base URL. A 401 answered to the
    /// stored access token is recovered transparently: the token pair is
    /// refreshed and the request replayed once.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
        options: RequestOptions,
    ) -> Result<ApiResponse> {
        let request = ApiRequest::new(method, path).body(body).options(options);
        self.execute(request).await
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::GET, path, None, RequestOptions::default())
            .await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.send(Method::POST, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PUT, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.send(Method::PATCH, path, Some(body), RequestOptions::default())
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.send(Method::DELETE, path, None, RequestOptions::default())
            .await
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get(path).await?.json()
    }

    /// POST `body` to `path` and decode the JSON response.
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.post(path, body).await?.json()
    }

    /// Send `request`, recovering from a rejected access token at most once.
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    pub(crate) async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
        let cancel = request.options.cancel.clone();
        if is_cancelled(cancel.as_ref()) {
            return Err(Error::Cancelled);
        }

        let (attached, response) =
            cancellable(cancel.as_ref(), self.dispatch(&request, None)).await?;

        let recover = response.status() == StatusCode::UNAUTHORIZED
            && request.recoverable
            && matches!(request.auth, Auth::Session);
        let stale = match attached {
            Some(token) if recover => token,
            _ => return self.finish(response).await,
        };

        if is_cancelled(cancel.as_ref()) {
            debug!("Request cancelled, skipping recovery");
            return Err(Error::Cancelled);
        }

        debug!("Access token rejected, recovering session");
        let recovery =
            cancellable(cancel.as_ref(), self.inner.refresh.recover(&stale, self.clone())).await;
        let fresh = match recovery {
            Ok(token) => token,
            // Tokens vanished underneath us; the original 401 stands
            Err(Error::Auth(AuthError::NotAuthenticated)) => return self.finish(response).await,
            Err(err) => return Err(err),
        };

        debug!("Replaying request with refreshed token");
        let (_, replay) =
            cancellable(cancel.as_ref(), self.dispatch(&request, Some(&fresh))).await?;
        self.finish(replay).await
    }

    /// Send `request` exactly once, with no recovery.
    pub(crate) async fn send_once(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let (_, response) =
            cancellable(request.options.cancel.as_ref(), self.dispatch(request, None)).await?;
        self.finish(response).await
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        fresh: Option<&AccessToken>,
    ) -> Result<(Option<AccessToken>, reqwest::Response)> {
        let url = self.inner.config.base_url.endpoint(&request.path);
        let mut builder = self.inner.http.request(request.method.clone(), &url);

        if !request.options.query.is_empty() {
            builder = builder.query(&request.options.query);
        }
        if !request.options.headers.is_empty() {
            builder = builder.headers(request.options.headers.clone());
        }
        if let Some(timeout) = request.options.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let (builder, attached) =
            interceptor::authorize(builder, &request.auth, self.store(), fresh);

        trace!(%url, authenticated = attached.is_some(), "Sending request");
        let timeout = request.options.timeout.unwrap_or(self.inner.config.timeout);
        let response = builder
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;
        trace!(status = %response.status(), "Response received");

        Ok((attached, response))
    }

    /// Read the body and turn non-success statuses into errors.
    async fn finish(&self, response: reqwest::Response) -> Result<ApiResponse> {
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(e, self.inner.config.timeout))?;

        if status.is_success() {
            Ok(ApiResponse::new(status, headers, body.to_vec()))
        } else {
            let error = protocol_error(status.as_u16(), &body);
            debug!(%error, "Request failed");
            Err(Error::Protocol(error))
        }
    }
}

#[async_trait]
impl Refresher for ApiClient {
    async fn refresh(&self, token: &RefreshToken) -> Result<TokenPair> {
        let request = ApiRequest::new(Method::POST, self.inner.config.endpoints.refresh.clone())
            .auth(Auth::Refresh(token.clone()))
            .unrecoverable();
        let response: RefreshResponse = self.send_once(&request).await?.json()?;
        Ok(TokenPair::new(response.access_token, response.refresh_token))
    }

    fn session_refreshed(&self) {
        info!("Access token refreshed");
        self.emit(SessionEvent::Refreshed);
    }

    fn session_expired(&self) {
        info!("Session expired");
        let hooks = self
            .inner
            .expiry_hooks
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for hook in hooks.iter() {
            hook();
        }
        drop(hooks);
        self.emit(SessionEvent::Expired);
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.config.base_url)
            .field("refresh", &self.inner.refresh)
            .finish_non_exhaustive()
    }
}

fn is_cancelled(signal: Option<&CancelSignal>) -> bool {
    signal.is_some_and(CancelSignal::is_cancelled)
}

/// Run `fut` unless `signal` fires first.
async fn cancellable<T>(
    signal: Option<&CancelSignal>,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    match signal {
        Some(signal) => {
            tokio::select! {
                biased;
                _ = signal.cancelled() => Err(Error::Cancelled),
                result = fut => result,
            }
        }
        None => fut.await,
    }
}
