//! tubekit-core - Core session types and traits.
//!
//! Everything the session layer shares: opaque tokens, login credentials,
//! the user identity projection, the validated API base URL, the error
//! taxonomy, and the [`TokenStore`] / [`Navigator`] seams that the HTTP
//! layer is built against.

pub mod credentials;
pub mod error;
pub mod identity;
pub mod tokens;
pub mod traits;
pub mod types;

pub use credentials::Credentials;
pub use error::Error;
pub use identity::User;
pub use tokens::{AccessToken, RefreshToken, TokenKind, TokenPair};
pub use traits::{LogoutReason, Navigator, NoopNavigator, TokenStore};
pub use types::ApiBaseUrl;

/// Result type alias using the crate's Error type.
pub type Result<T> = std::result::Result<T, Error>;
