//! In-memory token store.

use std::sync::{PoisonError, RwLock};

use tubekit_core::{Result, TokenPair, TokenStore};

/// Token store that lives as long as the process.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<Option<TokenPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that already holds a pair.
    pub fn with_pair(pair: TokenPair) -> Self {
        Self {
            tokens: RwLock::new(Some(pair)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, pair: TokenPair) -> Result<()> {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = Some(pair);
        Ok(())
    }

    fn pair(&self) -> Option<TokenPair> {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn clear(&self) -> Result<()> {
        *self.tokens.write().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
