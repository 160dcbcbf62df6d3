//! Token store: persistence of the single session token
//!
//! Serializes the current `SessionToken` as JSON under `TOKEN_KEY` in a
//! `KeyValueStorage`. The store is the only owner of the token; every other
//! component reads it back per request instead of keeping a copy.
//!
//! Writes are serialized by a lock shared between clones, which makes the
//! conditional operations (`replace_if`, `clear_if`, `take`) atomic with
//! respect to every other write through the same store. A refresh that
//! finishes after its session was signed out or replaced must not write.
//!
//! Reads never fail. A missing, unreadable, corrupt or partial record is
//! reported as absent, so a damaged storage entry heals itself on the next
//! successful write instead of wedging the client.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::constants::TOKEN_KEY;
use crate::error::{Error, Result};
use crate::storage::KeyValueStorage;
use crate::token::SessionToken;

/// Synchronous CRUD over the persisted session token.
///
/// Cheap to clone; clones share the same storage and write lock.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStorage>,
    writes: Arc<Mutex<()>>,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>) -> Self {
        Self {
            storage,
            writes: Arc::new(Mutex::new(())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.writes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the stored token.
    ///
    /// Fails only with `StorageUnavailable` when the medium rejects the write.
    pub fn put(&self, token: &SessionToken) -> Result<()> {
        let _guard = self.lock();
        self.write(token)
    }

    /// Replace the stored token only if `expected` is still the one stored.
    ///
    /// Returns whether the write happened. A signed-out or replaced session
    /// is left alone.
    pub fn replace_if(&self, expected: &SessionToken, token: &SessionToken) -> Result<bool> {
        let _guard = self.lock();
        if self.get().as_ref() != Some(expected) {
            debug!("stored session changed, not replacing");
            return Ok(false);
        }
        self.write(token)?;
        Ok(true)
    }

    fn write(&self, token: &SessionToken) -> Result<()> {
        let json = serde_json::to_string(token)
            .map_err(|e| Error::StorageUnavailable(format!("serializing token: {e}")))?;
        self.storage
            .set_item(TOKEN_KEY, &json)
            .map_err(|e| Error::StorageUnavailable(format!("writing token: {e}")))?;
        debug!(expires_at = token.expires_at, "stored session token");
        Ok(())
    }

    /// The current token, or `None` when there is no usable one.
    pub fn get(&self) -> Option<SessionToken> {
        let raw = match self.storage.get_item(TOKEN_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "token storage unreadable, treating session as absent");
                return None;
            }
        };

        match serde_json::from_str::<SessionToken>(&raw) {
            Ok(token) if token.is_complete() => Some(token),
            Ok(_) => {
                warn!("stored token is incomplete, treating session as absent");
                None
            }
            Err(e) => {
                warn!(error = %e, "stored token is corrupt, treating session as absent");
                None
            }
        }
    }

    /// Remove the stored token. Clearing an empty store is not an error.
    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock();
        self.remove()
    }

    /// Remove the stored token only if `expected` is still the one stored.
    /// Returns whether it was.
    pub fn clear_if(&self, expected: &SessionToken) -> Result<bool> {
        let _guard = self.lock();
        if self.get().as_ref() != Some(expected) {
            return Ok(false);
        }
        self.remove()?;
        Ok(true)
    }

    /// Remove the stored token and return it.
    ///
    /// On a failed removal the error is returned and the token stays stored.
    pub fn take(&self) -> Result<Option<SessionToken>> {
        let _guard = self.lock();
        let token = self.get();
        if token.is_some() {
            self.remove()?;
        }
        Ok(token)
    }

    fn remove(&self) -> Result<()> {
        self.storage
            .remove_item(TOKEN_KEY)
            .map_err(|e| Error::StorageUnavailable(format!("removing token: {e}")))?;
        debug!("cleared session token");
        Ok(())
    }

    /// Whether a usable session token is stored.
    pub fn is_present(&self) -> bool {
        self.get().is_some()
    }
}
