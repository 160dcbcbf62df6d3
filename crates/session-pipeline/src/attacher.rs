//! Credential attachment
//!
//! Stamps the `Authorization` header from whatever the token store holds at
//! send time. The token is read fresh for every request and never cached,
//! so a refresh completed by another request is picked up immediately.

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use session_auth::{SessionToken, TokenStore};
use tracing::warn;

/// Set or strip the `Authorization` header from the current stored token.
///
/// Returns whether a credential was attached. With no usable token any
/// caller-provided `Authorization` header is removed, so a request never
/// leaves with a stale or foreign credential.
pub fn attach(store: &TokenStore, headers: &mut HeaderMap) -> bool {
    match store.get() {
        Some(token) => stamp(headers, &token),
        None => {
            headers.remove(AUTHORIZATION);
            false
        }
    }
}

/// Set the `Authorization` header for `token`, replacing any existing one.
///
/// A credential that is not a valid header value is treated as absent.
pub fn stamp(headers: &mut HeaderMap, token: &SessionToken) -> bool {
    match HeaderValue::from_str(&token.authorization()) {
        Ok(mut value) => {
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
            true
        }
        Err(_) => {
            warn!("stored access credential is not a valid header value, sending without it");
            headers.remove(AUTHORIZATION);
            false
        }
    }
}

/// The `Authorization` value a request was sent with, if any.
pub fn sent_authorization(headers: &HeaderMap) -> Option<&str> {
    headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
}
