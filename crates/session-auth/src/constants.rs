//! Credential-issuing service constants
//!
//! Paths are relative to the configured auth base URL.

/// Storage key of the persisted session token record
pub const TOKEN_KEY: &str = "authToken";

/// Password sign-in and refresh share this endpoint, selected by `grant_type`
pub const TOKEN_PATH: &str = "/token";

/// Account creation endpoint
pub const SIGNUP_PATH: &str = "/signup";

/// Session revocation endpoint, takes a `scope` query parameter
pub const LOGOUT_PATH: &str = "/logout";

pub const GRANT_PASSWORD: &str = "password";

pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";
