//! Session authentication library
//!
//! Provides the session token model, its device-local persistence, and the
//! client for the credential-issuing service. This crate has no knowledge of
//! request interception; `session-pipeline` builds on it.
//!
//! Token lifecycle:
//! 1. `AuthApi::sign_in()` / `sign_up()` exchange user credentials for a token
//! 2. Token persisted via `TokenStore::put()` under `TOKEN_KEY`
//! 3. `AuthApi::refresh()` exchanges the refresh credential for a new pair
//! 4. New pair replaces the old one via `TokenStore::put()`
//! 5. `AuthApi::revoke()` + `TokenStore::clear()` end the session

pub mod api;
pub mod constants;
pub mod error;
pub mod storage;
pub mod store;
pub mod token;

pub use api::{
    AuthApi, CredentialIssuer, Identifier, LogoutScope, SignInCredentials, SignUpCredentials,
    TokenGrant,
};
pub use constants::TOKEN_KEY;
pub use error::{Error, Result};
pub use storage::{FileStorage, KeyValueStorage, MemoryStorage};
pub use store::TokenStore;
pub use token::{AuthUser, SessionToken, TokenResponse};
