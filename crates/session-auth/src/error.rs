//! Error types for the credential-issuing service client and the token store

/// Maximum length for error response bodies quoted in errors
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors from session authentication operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("auth endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid token response: {0}")]
    InvalidResponse(String),

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl Error {
    /// Build a `Status` error, truncating the body to avoid logging
    /// excessive data.
    pub fn status(status: u16, body: &str) -> Self {
        let body = if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        };
        Error::Status { status, body }
    }
}

impl From<transport::TransportError> for Error {
    fn from(e: transport::TransportError) -> Self {
        match e {
            transport::TransportError::Timeout(msg) => Error::Timeout(msg),
            other => Error::Http(other.to_string()),
        }
    }
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
