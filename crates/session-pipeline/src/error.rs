//! Error types for session pipeline operations

use crate::classify::RefreshFailure;

/// Errors from the authenticated client's own operations.
///
/// Requests sent through the client never surface these: an authorization
/// failure that could not be recovered comes back as the original response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Auth(#[from] session_auth::Error),

    #[error(transparent)]
    Transport(#[from] transport::TransportError),

    #[error(transparent)]
    Refresh(#[from] RefreshFailure),

    #[error("no session: sign in first")]
    NoSession,
}

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;
