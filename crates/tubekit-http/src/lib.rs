//! tubekit-http - Session-managed HTTP client for the platform API.
//!
//! Every request the application makes goes through one [`ApiClient`]. The
//! client attaches the stored access token, and when the server rejects it
//! the [`RefreshCoordinator`] mints a new pair (one refresh for any number
//! of concurrent failures) and replays the request once. [`Session`] sits
//! on top and tracks who is logged in.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tubekit_core::{ApiBaseUrl, Credentials, NoopNavigator};
//! use tubekit_http::{ApiClient, ClientConfig, Session};
//! use tubekit_store::MemoryTokenStore;
//!
//! # async fn example() -> Result<(), tubekit_core::Error> {
//! let config = ClientConfig::new(ApiBaseUrl::new("https://videos.example.com/api")?);
//! let client = ApiClient::new(config, Arc::new(MemoryTokenStore::new()))?;
//! let session = Session::new(client.clone(), Arc::new(NoopNavigator));
//!
//! session.bootstrap().await;
//! session.login(Credentials::new("alice", "hunter2")).await?;
//!
//! let feed: serde_json::Value = client.get_json("/videos/subscriptions").await?;
//! println!("{feed}");
//! # Ok(())
//! # }
//! ```

mod cancel;
mod client;
mod config;
mod endpoints;
mod error;
mod interceptor;
mod refresh;
mod request;
mod session;

pub use cancel::{CancelHandle, CancelSignal};
pub use client::{ApiClient, SessionEvent};
pub use config::{AuthEndpoints, ClientConfig};
pub use refresh::{RefreshCoordinator, RefreshState, Refresher};
pub use request::{ApiResponse, RequestOptions};
pub use session::Session;

pub use reqwest::{Method, StatusCode};
