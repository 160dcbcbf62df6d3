//! Sign-out policy: the single cleanup routine for ending a session
//!
//! Used both when the user signs out and when the refresh credential is
//! rejected. Local state is cleared first so the client is unauthenticated
//! no matter what the credential-issuing service does with the revocation.
//!
//! A forced sign-out revokes in the background: requests waiting on the
//! rejected refresh get their response without waiting for the revocation.

use std::sync::{Arc, Mutex, PoisonError};

use session_auth::{CredentialIssuer, LogoutScope, SessionToken, TokenStore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::metrics;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// Explicit sign-out by the user
    UserInitiated,
    /// The refresh credential was rejected by the credential-issuing service
    RefreshRejected,
}

impl SignOutReason {
    pub fn label(&self) -> &'static str {
        match self {
            SignOutReason::UserInitiated => "user_initiated",
            SignOutReason::RefreshRejected => "refresh_rejected",
        }
    }
}

/// Application-level reaction to a finished sign-out, such as returning to
/// a login screen. Runs last, after the store is cleared.
pub trait ResetStrategy: Send + Sync {
    fn reset(&self, reason: SignOutReason);
}

impl<F> ResetStrategy for F
where
    F: Fn(SignOutReason) + Send + Sync,
{
    fn reset(&self, reason: SignOutReason) {
        self(reason)
    }
}

/// Default reset: log and leave the process unauthenticated.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReset;

impl ResetStrategy for LogReset {
    fn reset(&self, reason: SignOutReason) {
        info!(
            reason = reason.label(),
            "session ended, client is unauthenticated"
        );
    }
}

/// Clears the session, revokes it best-effort, then resets.
pub struct SignOutPolicy {
    store: TokenStore,
    issuer: Arc<dyn CredentialIssuer>,
    reset: Arc<dyn ResetStrategy>,
    scope: LogoutScope,
    revocations: Mutex<JoinSet<()>>,
}

impl SignOutPolicy {
    pub fn new(store: TokenStore, issuer: Arc<dyn CredentialIssuer>) -> Self {
        Self {
            store,
            issuer,
            reset: Arc::new(LogReset),
            scope: LogoutScope::default(),
            revocations: Mutex::new(JoinSet::new()),
        }
    }

    pub fn with_reset(mut self, reset: Arc<dyn ResetStrategy>) -> Self {
        self.reset = reset;
        self
    }

    pub fn with_scope(mut self, scope: LogoutScope) -> Self {
        self.scope = scope;
        self
    }

    /// End the session.
    ///
    /// Never fails: a storage error while clearing and a failed revocation
    /// are both logged and cleanup continues.
    pub async fn sign_out(&self, reason: SignOutReason) {
        let token = match self.store.take() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "failed to clear stored token during sign-out");
                self.store.get()
            }
        };

        match &token {
            Some(token) => revoke(self.issuer.as_ref(), token, self.scope).await,
            None => debug!("no stored token, skipping revocation"),
        }

        self.finish(reason);
    }

    /// End `session` if it is still the stored one; a session signed out or
    /// replaced in the meantime is left alone. Returns whether it ended.
    ///
    /// Revocation runs as a background task, see `finish_revocations`.
    pub fn sign_out_session(&self, reason: SignOutReason, session: &SessionToken) -> bool {
        match self.store.clear_if(session) {
            Ok(true) => {}
            Ok(false) => {
                debug!(
                    reason = reason.label(),
                    "session already ended or replaced, not signing out"
                );
                return false;
            }
            Err(e) => warn!(error = %e, "failed to clear stored token during sign-out"),
        }

        let issuer = Arc::clone(&self.issuer);
        let token = session.clone();
        let scope = self.scope;
        self.revocations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .spawn(async move { revoke(issuer.as_ref(), &token, scope).await });

        self.finish(reason);
        true
    }

    /// Wait for background revocations started by forced sign-outs.
    pub async fn finish_revocations(&self) {
        let mut pending = std::mem::take(
            &mut *self
                .revocations
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "session revocation task failed");
            }
        }
    }

    fn finish(&self, reason: SignOutReason) {
        metrics::record_sign_out(reason.label());
        info!(reason = reason.label(), "signed out");
        self.reset.reset(reason);
    }
}

/// Best-effort revocation; failures are logged, never retried.
async fn revoke(issuer: &dyn CredentialIssuer, token: &SessionToken, scope: LogoutScope) {
    if let Err(e) = issuer.revoke(token, scope).await {
        warn!(
            error = %e,
            scope = scope.as_str(),
            "session revocation failed, local session already cleared"
        );
    }
}
