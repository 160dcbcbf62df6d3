//! Session token model and the token endpoint wire format
//!
//! `SessionToken` is the persisted credential record: access credential,
//! refresh credential, absolute expiry and scheme. It is only ever built
//! whole, either from a token endpoint response or from a persisted record
//! that passed `is_complete`.
//!
//! `TokenResponse` is what the credential-issuing service returns for
//! password sign-in, sign-up and refresh. Expiry is accepted either as an
//! absolute `expires_at` or as an `expires_in` delta.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use common::Secret;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One authenticated session's credentials.
///
/// `expires_at` is a unix timestamp in seconds (absolute, not a delta).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    /// Bearer credential sent on every request
    pub access_token: Secret<String>,
    /// Credential exchanged for a new token pair
    pub refresh_token: Secret<String>,
    /// Expiration as unix timestamp in seconds
    pub expires_at: u64,
    /// Credential scheme as issued, e.g. "bearer"
    pub token_type: String,
}

impl SessionToken {
    pub fn new(
        access_token: impl Into<Secret<String>>,
        refresh_token: impl Into<Secret<String>>,
        expires_at: u64,
        token_type: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
            token_type: token_type.into(),
        }
    }

    /// A record is complete when both credentials and the scheme are
    /// non-empty. Incomplete records are never used.
    pub fn is_complete(&self) -> bool {
        !self.access_token.expose().is_empty()
            && !self.refresh_token.expose().is_empty()
            && !self.token_type.trim().is_empty()
    }

    /// The `Authorization` header value: capitalized scheme, a space, the
    /// access credential.
    pub fn authorization(&self) -> String {
        format!(
            "{} {}",
            capitalize(self.token_type.trim()),
            self.access_token.expose()
        )
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at <= now_secs()
    }

    /// Whether the token expires within `threshold` from now.
    pub fn expires_within(&self, threshold: Duration) -> bool {
        self.expires_at <= now_secs().saturating_add(threshold.as_secs())
    }

    /// Seconds until expiry, zero once expired.
    pub fn secs_until_expiry(&self) -> u64 {
        self.expires_at.saturating_sub(now_secs())
    }
}

/// Uppercase the first character and lowercase the rest ("bearer" → "Bearer").
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// Current unix time in seconds.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// The authenticated user as reported alongside a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Response from the token endpoint for sign-in, sign-up and refresh.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: Secret<String>,
    pub refresh_token: Secret<String>,
    /// Absolute expiry in unix seconds
    #[serde(default)]
    pub expires_at: Option<u64>,
    /// Seconds until the access token expires (delta, not absolute)
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub token_type: String,
    #[serde(default)]
    pub user: Option<AuthUser>,
}

impl TokenResponse {
    /// Convert into a persisted token. `expires_at` wins over `expires_in`;
    /// a response with neither, or with an empty credential, is rejected so a
    /// partial token can never reach the store.
    pub fn into_session(self) -> Result<(SessionToken, Option<AuthUser>)> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(delta)) => now_secs().saturating_add(delta),
            (None, None) => {
                return Err(Error::InvalidResponse(
                    "token response has neither expires_at nor expires_in".into(),
                ));
            }
        };
        let token = SessionToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            token_type: self.token_type,
        };
        if !token.is_complete() {
            return Err(Error::InvalidResponse(
                "token response has an empty credential".into(),
            ));
        }
        Ok((token, self.user))
    }
}
