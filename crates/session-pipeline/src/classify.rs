//! Outcome classification for the refresh flow
//!
//! Every status inspection the pipeline does happens here. A response is
//! either an authorization failure (eligible for refresh) or passes through
//! untouched; a failed refresh lands in exactly one `RefreshFailure` variant,
//! and the variant alone decides whether the session survives.

use reqwest::StatusCode;
use session_auth::Error as AuthError;

/// Why a refresh attempt did not produce a usable token.
///
/// - `Transient`: outage, timeout or malformed reply; session kept, caller
///   may retry later
/// - `InvalidCredential`: the refresh credential was rejected; forced sign-out
/// - `StorageUnavailable`: a new token was issued but could not be persisted;
///   the client continues unauthenticated
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefreshFailure {
    #[error("transient refresh failure: {0}")]
    Transient(String),

    #[error("refresh credential rejected: {0}")]
    InvalidCredential(String),

    #[error("token storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl RefreshFailure {
    /// Label for logging and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RefreshFailure::Transient(_) => "transient",
            RefreshFailure::InvalidCredential(_) => "invalid_credential",
            RefreshFailure::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

/// Whether a response status means the access credential was not accepted.
pub fn is_authorization_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED
}

/// Classify a refresh exchange error.
///
/// Client errors from the token endpoint mean the refresh credential itself is
/// invalid, except 408 and 429 which say nothing about the credential.
/// Server errors, timeouts, transport failures and undecodable replies are
/// transient.
pub fn classify_refresh_error(err: &AuthError) -> RefreshFailure {
    match err {
        AuthError::Status { status, .. } => match status {
            408 | 429 => RefreshFailure::Transient(err.to_string()),
            400..=499 => RefreshFailure::InvalidCredential(err.to_string()),
            _ => RefreshFailure::Transient(err.to_string()),
        },
        AuthError::StorageUnavailable(_) => RefreshFailure::StorageUnavailable(err.to_string()),
        AuthError::Http(_) | AuthError::Timeout(_) | AuthError::InvalidResponse(_) => {
            RefreshFailure::Transient(err.to_string())
        }
    }
}
