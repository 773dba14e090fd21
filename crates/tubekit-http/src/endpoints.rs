//! Wire types for the authentication endpoints.

use serde::{Deserialize, Serialize};

use tubekit_core::User;

/// Request body for login.
#[derive(Debug, Serialize)]
pub(crate) struct LoginRequest<'a> {
    pub identifier: &'a str,
    pub password: &'a str,
}

/// Response from login.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: User,
}

/// Response from the refresh endpoint.
/// The refresh token travels in the Authorization header; the body is empty.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Response from the identity endpoint, which some deployments wrap.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum IdentityResponse {
    Wrapped { user: User },
    Bare(User),
}

impl IdentityResponse {
    pub fn into_user(self) -> User {
        match self {
            IdentityResponse::Wrapped { user } | IdentityResponse::Bare(user) => user,
        }
    }
}

/// Error body format.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
