//! Navigation hook for session teardown.

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user asked to log out.
    Requested,
    /// The refresh token was rejected.
    Expired,
}

/// Sends the user back to an unauthenticated entry point.
///
/// The session calls this after it has cleared tokens and identity, so an
/// implementation may read session state and find it empty.
pub trait Navigator: Send + Sync {
    fn to_login(&self, reason: LogoutReason);
}

/// A navigator that does nothing, for headless consumers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn to_login(&self, _reason: LogoutReason) {}
}
