//! Seams the HTTP layer is built against.

mod navigator;
mod token_store;

pub use navigator::{LogoutReason, Navigator, NoopNavigator};
pub use token_store::TokenStore;
