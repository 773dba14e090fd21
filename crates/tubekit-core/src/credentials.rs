//! Login credentials type.

use std::fmt;

/// Login credentials for the platform API.
///
/// The identifier is whatever the login endpoint accepts (username or
/// email). The password is never exposed in Debug output.
///
/// # Example
///
/// ```
/// use tubekit_core::Credentials;
///
/// let creds = Credentials::new("alice@example.com", "hunter2");
/// assert_eq!(creds.identifier(), "alice@example.com");
/// ```
#[derive(Clone)]
pub struct Credentials {
    identifier: String,
    password: String,
}

impl Credentials {
    /// Create new credentials.
    pub fn new(identifier: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            password: password.into(),
        }
    }

    /// Returns the identifier (username or email).
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Returns the password.
    ///
    /// # Security
    ///
    /// Use this only when constructing the login request. Never log it.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("password", &"[REDACTED]")
            .finish()
    }
}
