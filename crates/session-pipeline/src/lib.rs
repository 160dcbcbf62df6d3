//! Authenticated request pipeline
//!
//! Wraps a `Transport` so every request carries the current session
//! credential, expired credentials are renewed transparently, and a session
//! whose refresh credential was rejected is torn down exactly once.
//!
//! Request lifecycle:
//! 1. `attacher` stamps `Authorization` from the token store (or strips it)
//! 2. Request goes out through the underlying transport
//! 3. A 401 reaches the `RefreshCoordinator`, which joins or starts the single
//!    pending refresh and retries the request once with the new credential
//! 4. A rejected refresh runs the `SignOutPolicy`: clear, revoke, reset
//! 5. Optionally, `spawn_refresh_task` renews the session before it expires

pub mod attacher;
pub mod classify;
pub mod client;
pub mod coordinator;
pub mod error;
pub mod flight;
pub mod metrics;
pub mod refresh;
pub mod signout;

#[cfg(test)]
pub(crate) mod testutil;

pub use classify::{RefreshFailure, classify_refresh_error, is_authorization_failure};
pub use client::AuthenticatedClient;
pub use coordinator::{RefreshCoordinator, RefreshResult};
pub use error::{Error, Result};
pub use flight::SingleFlight;
pub use refresh::spawn_refresh_task;
pub use signout::{LogReset, ResetStrategy, SignOutPolicy, SignOutReason};
