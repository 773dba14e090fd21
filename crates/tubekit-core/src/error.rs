//! Error types for the tubekit session layer.
//!
//! One error type with explicit variants for transport, authentication,
//! protocol, input validation and storage failures. Every variant is
//! `Clone` so a single refresh outcome can be handed to all waiting callers.

use std::fmt;
use thiserror::Error;

/// The unified error type for tubekit operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Network transport errors (connection, timeout, body decoding).
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Session-level authentication errors.
    #[error("authentication error: {0}")]
    Auth(#[from] AuthError),

    /// The server answered with a non-success status.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Input validation errors (base URL, header values, JSON).
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidInputError),

    /// Token store failures.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// The caller cancelled the request.
    #[error("request cancelled")]
    Cancelled,
}

impl Error {
    /// Returns the HTTP status if this error came from a server response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Protocol(err) => Some(err.status),
            _ => None,
        }
    }

    /// Returns true if the server rejected the request's credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Error::Protocol(err) if err.is_unauthorized())
    }

    /// Returns true if the session was terminated and the user must log in again.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Error::Auth(AuthError::SessionExpired))
    }

    /// Returns true for network-level failures, including timeouts.
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

/// Transport-level errors.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Network connection failed.
    #[error("connection failed: {message}")]
    Connection { message: String },

    /// Request timed out.
    #[error("request timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The response body could not be read or decoded.
    #[error("failed to read response body: {message}")]
    Body { message: String },

    /// Generic HTTP error.
    #[error("HTTP error: {message}")]
    Http { message: String },
}

/// Authentication-related errors raised by the session layer itself.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The refresh token was rejected; the session has been torn down.
    #[error("session expired")]
    SessionExpired,

    /// No credentials are stored.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Login was refused.
    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),
}

/// A non-success response from the API.
#[derive(Debug, Clone)]
pub struct ProtocolError {
    /// HTTP status code.
    pub status: u16,
    /// Machine-readable error code (if the body carried one).
    pub error: Option<String>,
    /// Error message from the server.
    pub message: Option<String>,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(ref error) = self.error {
            write!(f, " [{}]", error)?;
        }
        if let Some(ref message) = self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ProtocolError {}

impl ProtocolError {
    /// Create a new protocol error.
    pub fn new(status: u16, error: Option<String>, message: Option<String>) -> Self {
        Self {
            status,
            error,
            message,
        }
    }

    /// Check if the server rejected the request's credentials.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }
}

/// Input validation errors.
#[derive(Debug, Clone, Error)]
pub enum InvalidInputError {
    /// Invalid API base URL.
    #[error("invalid base URL '{value}': {reason}")]
    BaseUrl { value: String, reason: String },

    /// Invalid header name or value.
    #[error("invalid header '{name}': {reason}")]
    Header { name: String, reason: String },

    /// A body could not be encoded or decoded as JSON.
    #[error("invalid JSON: {message}")]
    Json { message: String },

    /// Generic invalid input.
    #[error("invalid input: {message}")]
    Other { message: String },
}

impl From<serde_json::Error> for InvalidInputError {
    fn from(err: serde_json::Error) -> Self {
        InvalidInputError::Json {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidInput(err.into())
    }
}

/// Token store errors.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Reading or writing the backing file failed.
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    /// The stored tokens could not be encoded.
    #[error("failed to encode tokens: {message}")]
    Encode { message: String },
}
