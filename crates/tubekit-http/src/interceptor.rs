//! Request authorization, applied immediately before transmission.

use reqwest::RequestBuilder;
use tracing::trace;

use tubekit_core::{AccessToken, TokenKind, TokenStore};

use crate::request::Auth;

/// Attach credentials to an outgoing request.
///
/// For session requests the access token is read from `store` at this
/// moment, unless `fresh` supplies the token a replay must use. Returns the
/// access token that was attached, so a later 401 can be matched against
/// the token that caused it.
pub(crate) fn authorize(
    builder: RequestBuilder,
    auth: &Auth,
    store: &dyn TokenStore,
    fresh: Option<&AccessToken>,
) -> (RequestBuilder, Option<AccessToken>) {
    match auth {
        Auth::Anonymous => (builder, None),
        Auth::Refresh(token) => (builder.bearer_auth(token.as_str()), None),
        Auth::Session => {
            let token = fresh
                .cloned()
                .or_else(|| store.get(TokenKind::Access).map(AccessToken::new));

            match token {
                Some(token) => (builder.bearer_auth(token.as_str()), Some(token)),
                None => {
                    trace!("No access token stored, sending unauthenticated");
                    (builder, None)
                }
            }
        }
    }
}
