//! Token store trait.

use crate::tokens::{TokenKind, TokenPair};
use crate::Result;

/// Durable storage for the access/refresh pair.
///
/// Implementations are pure storage: no validation, no parsing. `save`
/// replaces both tokens at once and readers never see half of an update.
/// Methods are synchronous because the request path reads the access token
/// right before every transmission.
pub trait TokenStore: Send + Sync {
    /// Persist both tokens, overwriting any previous pair.
    fn save(&self, pair: TokenPair) -> Result<()>;

    /// Returns a consistent snapshot of both tokens, if any are stored.
    fn pair(&self) -> Option<TokenPair>;

    /// Remove both tokens. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;

    /// Returns one stored token.
    fn get(&self, kind: TokenKind) -> Option<String> {
        self.pair().map(|pair| pair.get(kind).to_string())
    }
}
