//! Request and response types.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;

use tubekit_core::error::InvalidInputError;
use tubekit_core::{RefreshToken, Result};

use crate::cancel::CancelSignal;

/// Which credential a request carries.
#[derive(Debug, Clone)]
pub(crate) enum Auth {
    /// The current access token, read right before sending.
    Session,
    /// The refresh token, for the refresh call only.
    Refresh(RefreshToken),
    /// No credentials (login).
    Anonymous,
}

/// Per-request knobs.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub(crate) query: Vec<(String, String)>,
    pub(crate) headers: HeaderMap,
    pub(crate) timeout: Option<Duration>,
    pub(crate) cancel: Option<CancelSignal>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header to this request.
    ///
    /// # Errors
    ///
    /// Returns an error if the name or value is not a valid HTTP header.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self> {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| InvalidInputError::Header {
                name: name.to_string(),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| InvalidInputError::Header {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
        self.headers.insert(header_name, header_value);
        Ok(self)
    }

    /// Override the client-wide timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Abandon the request when `signal` fires.
    pub fn cancel_on(mut self, signal: CancelSignal) -> Self {
        self.cancel = Some(signal);
        self
    }
}

/// A request as the client replays it: everything needed to send it again.
#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    pub auth: Auth,
    /// Whether a 401 may trigger refresh-and-replay.
    pub recoverable: bool,
    pub options: RequestOptions,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            auth: Auth::Session,
            recoverable: true,
            options: RequestOptions::default(),
        }
    }

    pub fn body(mut self, body: Option<serde_json::Value>) -> Self {
        self.body = body;
        self
    }

    pub fn auth(mut self, auth: Auth) -> Self {
        self.auth = auth;
        self
    }

    pub fn unrecoverable(mut self) -> Self {
        self.recoverable = false;
        self
    }

    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }
}

/// A successful response with its body fully read.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ApiResponse {
    pub(crate) fn new(status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn options_collect_query_and_headers() {
        let options = RequestOptions::new()
            .query("page", "2")
            .query("limit", "20")
            .header("x-client", "tubekit")
            .unwrap()
            .timeout(Duration::from_secs(3));

        assert_eq!(options.query.len(), 2);
        assert_eq!(options.headers["x-client"], "tubekit");
        assert_eq!(options.timeout, Some(Duration::from_secs(3)));
    }

    #[test]
    fn invalid_header_is_rejected() {
        assert!(RequestOptions::new().header("bad header", "x").is_err());
        assert!(RequestOptions::new().header("x-ok", "line\nbreak").is_err());
    }

    #[test]
    fn response_decodes_json() {
        let response = ApiResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            br#"{"likes": 3}"#.to_vec(),
        );
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value, json!({"likes": 3}));
        assert_eq!(response.text(), r#"{"likes": 3}"#);
    }

    #[test]
    fn response_json_error_is_invalid_input() {
        let response = ApiResponse::new(StatusCode::OK, HeaderMap::new(), b"nope".to_vec());
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, tubekit_core::Error::InvalidInput(_)));
    }
}
