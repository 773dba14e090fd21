//! Mapping of reqwest failures and error responses onto the core error type.

use std::time::Duration;

use tubekit_core::Error;
use tubekit_core::error::{ProtocolError, TransportError};

use crate::endpoints::ErrorBody;

pub(crate) fn transport_error(err: reqwest::Error, timeout: Duration) -> Error {
    let transport = if err.is_timeout() {
        TransportError::Timeout {
            duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }
    } else if err.is_connect() {
        TransportError::Connection {
            message: err.to_string(),
        }
    } else if err.is_body() || err.is_decode() {
        TransportError::Body {
            message: err.to_string(),
        }
    } else {
        TransportError::Http {
            message: err.to_string(),
        }
    };
    Error::Transport(transport)
}

/// Build a protocol error from a non-success status and its body.
pub(crate) fn protocol_error(status: u16, body: &[u8]) -> ProtocolError {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(parsed) => ProtocolError::new(status, parsed.error, parsed.message),
        Err(_) => ProtocolError::new(status, None, None),
    }
}
