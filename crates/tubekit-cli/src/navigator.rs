//! Terminal rendition of "go back to the login screen".

use tracing::info;
use tubekit_core::{LogoutReason, Navigator};

/// A terminal has no login screen to return to. The command that hit the
/// ended session reports it through its error, so this only records it.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalNavigator;

impl Navigator for TerminalNavigator {
    fn to_login(&self, reason: LogoutReason) {
        info!(?reason, "Session ended");
    }
}
