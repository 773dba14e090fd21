//! The authenticated user's identity projection.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The user profile the server returns for the current session.
///
/// The session layer only stores and hands this value out. Fields beyond
/// the ones named here are kept verbatim in [`User::extra`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(alias = "_id")]
    pub id: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn is_verified(&self) -> bool {
        self.is_verified
    }

    /// Returns true when the server granted the admin role (moderation views).
    pub fn is_admin(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| role.eq_ignore_ascii_case("admin"))
    }

    /// Look up a field the typed projection does not name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }
}
