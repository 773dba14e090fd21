//! Client configuration.

use std::time::Duration;

use tubekit_core::error::InvalidInputError;
use tubekit_core::{ApiBaseUrl, Result};

/// Environment variable holding the API base URL.
pub const API_URL_ENV: &str = "TUBEKIT_API_URL";

/// Environment variable overriding the request timeout, in seconds.
pub const TIMEOUT_ENV: &str = "TUBEKIT_TIMEOUT_SECS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Paths of the endpoints the session layer itself calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    /// `POST {identifier, password}` → `{accessToken, refreshToken, user}`
    pub login: String,
    /// `POST` with the refresh token as bearer → `{accessToken, refreshToken}`
    pub refresh: String,
    /// `GET` → the current user
    pub identity: String,
    /// `POST`, best effort
    pub logout: String,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "/auth/login".to_string(),
            refresh: "/auth/refresh-token".to_string(),
            identity: "/auth/me".to_string(),
            logout: "/auth/logout".to_string(),
        }
    }
}

/// Settings for the shared [`ApiClient`](crate::ApiClient).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: ApiBaseUrl,
    /// Whole-request timeout. Always finite.
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
    pub endpoints: AuthEndpoints,
}

impl ClientConfig {
    pub fn new(base_url: ApiBaseUrl) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: concat!("tubekit/", env!("CARGO_PKG_VERSION")).to_string(),
            endpoints: AuthEndpoints::default(),
        }
    }

    /// Build a configuration from `TUBEKIT_API_URL` and `TUBEKIT_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = lookup(API_URL_ENV).ok_or_else(|| InvalidInputError::Other {
            message: format!("{API_URL_ENV} is not set"),
        })?;
        let mut config = Self::new(ApiBaseUrl::new(base_url)?);

        if let Some(raw) = lookup(TIMEOUT_ENV) {
            let secs: u64 = raw.trim().parse().map_err(|_| InvalidInputError::Other {
                message: format!("{TIMEOUT_ENV} must be a whole number of seconds, got '{raw}'"),
            })?;
            config = config.with_timeout(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Set the request timeout. A zero duration falls back to the default.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() {
            DEFAULT_TIMEOUT
        } else {
            timeout
        };
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        if !timeout.is_zero() {
            self.connect_timeout = timeout;
        }
        self
    }

    pub fn with_endpoints(mut self, endpoints: AuthEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_are_finite() {
        let config = ClientConfig::new(ApiBaseUrl::new("https://videos.example.com").unwrap());
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.endpoints.refresh, "/auth/refresh-token");
        assert!(config.user_agent.starts_with("tubekit/"));
    }

    #[test]
    fn from_env_reads_base_url_and_timeout() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_URL_ENV, "https://videos.example.com/api"),
            (TIMEOUT_ENV, "5"),
        ]))
        .unwrap();

        assert_eq!(config.base_url.endpoint("/auth/me"), "https://videos.example.com/api/auth/me");
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn from_env_requires_base_url() {
        let err = ClientConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(err.to_string().contains(API_URL_ENV));
    }

    #[test]
    fn from_env_rejects_bad_timeout() {
        let result = ClientConfig::from_lookup(lookup(&[
            (API_URL_ENV, "https://videos.example.com"),
            (TIMEOUT_ENV, "soon"),
        ]));
        assert!(result.is_err());
    }

    #[test]
    fn zero_timeout_keeps_default() {
        let config = ClientConfig::new(ApiBaseUrl::new("https://videos.example.com").unwrap())
            .with_timeout(Duration::ZERO);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }
}
