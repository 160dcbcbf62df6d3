//! Refresh coordinator: single-flight token refresh and one-shot retry
//!
//! When a request comes back `401`, the coordinator renews the session and
//! re-issues the request once with the new access credential. However many
//! requests fail together, one refresh exchange runs; the rest attach to it.
//!
//! Flow for an authorization failure:
//! 1. Not a 401, already retried, or no stored token → response passes through
//! 2. Under the single-flight lock: attach to the running refresh, or, if the
//!    store already holds a different credential than the request carried,
//!    retry with that; otherwise start a refresh
//! 3. The refresh task persists the new token if the session it refreshed is
//!    still stored, or classifies the failure and signs out when the refresh
//!    credential was rejected
//! 4. Success → re-stamp, mark retried, re-send; failure → original response

use std::future::Future;
use std::sync::Arc;

use session_auth::{CredentialIssuer, SessionToken, TokenStore};
use tracing::{debug, info, warn};
use transport::{ApiRequest, ApiResponse, Transport};

use crate::attacher::{sent_authorization, stamp};
use crate::classify::{RefreshFailure, classify_refresh_error, is_authorization_failure};
use crate::error::{Error, Result};
use crate::flight::SingleFlight;
use crate::metrics;
use crate::signout::{SignOutPolicy, SignOutReason};

/// Outcome of one refresh exchange, shared by every request waiting on it.
pub type RefreshResult = std::result::Result<SessionToken, RefreshFailure>;

pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    store: TokenStore,
    issuer: Arc<dyn CredentialIssuer>,
    sign_out: Arc<SignOutPolicy>,
    pending: SingleFlight<RefreshResult>,
}

impl RefreshCoordinator {
    /// `transport` is the unauthenticated client retried requests go through.
    pub fn new(
        transport: Arc<dyn Transport>,
        store: TokenStore,
        issuer: Arc<dyn CredentialIssuer>,
        sign_out: Arc<SignOutPolicy>,
    ) -> Self {
        Self {
            transport,
            store,
            issuer,
            sign_out,
            pending: SingleFlight::new(),
        }
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn is_refreshing(&self) -> bool {
        self.pending.is_in_flight()
    }

    /// Resolve a response, renewing the session and retrying once if the
    /// request was rejected for its credential.
    ///
    /// `request` is the request exactly as it was sent. Only errors from the
    /// retried send itself are returned as `Err`.
    pub async fn handle(
        &self,
        request: ApiRequest,
        response: ApiResponse,
    ) -> transport::Result<ApiResponse> {
        if !is_authorization_failure(response.status) || request.is_retried() {
            return Ok(response);
        }
        if !self.store.is_present() {
            debug!("authorization failure without a session, passing through");
            return Ok(response);
        }

        debug!(
            method = %request.method,
            url = %request.url,
            "authorization failure, renewing session"
        );
        let sent_with = sent_authorization(&request.headers).map(str::to_string);
        match self.renew(sent_with.as_deref()).await {
            Some(Ok(token)) => self.retry(request, &token).await,
            Some(Err(failure)) => {
                debug!(
                    outcome = failure.label(),
                    "session not renewed, returning original response"
                );
                Ok(response)
            }
            None => Ok(response),
        }
    }

    /// Refresh now, joining a refresh already in flight.
    ///
    /// Fails with `NoSession` when nothing is stored.
    pub async fn refresh_now(&self) -> Result<SessionToken> {
        let flight = self
            .pending
            .join_or_start(|| self.store.get().map(|current| self.refresh_task(current)))
            .ok_or(Error::NoSession)?;
        Ok(settle(flight.await)?)
    }

    /// Wait until no refresh is in flight.
    pub async fn wait_idle(&self) {
        while let Some(flight) = self.pending.current() {
            flight.await;
        }
    }

    /// Get a credential to retry with. `None` means there is no session to
    /// renew.
    async fn renew(&self, sent_with: Option<&str>) -> Option<RefreshResult> {
        let mut renewed = None;
        let flight = self.pending.join_or_start(|| {
            let current = self.store.get()?;
            if sent_with != Some(current.authorization().as_str()) {
                renewed = Some(current);
                return None;
            }
            Some(self.refresh_task(current))
        });

        match flight {
            Some(flight) => Some(settle(flight.await)),
            None => {
                if renewed.is_some() {
                    debug!("session already renewed, retrying with stored credential");
                }
                renewed.map(Ok)
            }
        }
    }

    async fn retry(
        &self,
        mut request: ApiRequest,
        token: &SessionToken,
    ) -> transport::Result<ApiResponse> {
        stamp(&mut request.headers, token);
        request.mark_retried();
        metrics::record_retry();
        let response = self.transport.send(request).await?;
        if is_authorization_failure(response.status) {
            warn!("request rejected again after refresh, returning response as-is");
        }
        Ok(response)
    }

    /// The refresh exchange and its side effects, owned so it can run as a
    /// detached task.
    fn refresh_task(
        &self,
        current: SessionToken,
    ) -> impl Future<Output = RefreshResult> + Send + use<> {
        let issuer = Arc::clone(&self.issuer);
        let store = self.store.clone();
        let sign_out = Arc::clone(&self.sign_out);

        async move {
            debug!("refreshing session token");
            let result = match issuer.refresh(current.refresh_token.expose()).await {
                Ok(token) => store.replace_if(&current, &token).map(|stored| (token, stored)),
                Err(e) => Err(e),
            }
            .map_err(|e| classify_refresh_error(&e))
            .and_then(|(token, stored)| {
                if stored {
                    Ok(token)
                } else {
                    Err(RefreshFailure::Transient(
                        "session ended or replaced during refresh".into(),
                    ))
                }
            });

            match &result {
                Ok(token) => {
                    metrics::record_refresh("success");
                    info!(
                        expires_in_secs = token.secs_until_expiry(),
                        "session token refreshed"
                    );
                }
                Err(failure) => {
                    metrics::record_refresh(failure.label());
                    match failure {
                        RefreshFailure::InvalidCredential(_) => {
                            warn!(error = %failure, "refresh credential rejected, signing out");
                            sign_out.sign_out_session(SignOutReason::RefreshRejected, &current);
                        }
                        RefreshFailure::Transient(_) => {
                            warn!(error = %failure, "session refresh failed, keeping session");
                        }
                        RefreshFailure::StorageUnavailable(_) => {
                            warn!(
                                error = %failure,
                                "refreshed token could not be stored, continuing unauthenticated"
                            );
                            if let Err(e) = store.clear_if(&current) {
                                debug!(error = %e, "stale token could not be cleared either");
                            }
                        }
                    }
                }
            }
            result
        }
    }
}

/// A refresh task that panicked or was cancelled counts as transient.
fn settle(outcome: Option<RefreshResult>) -> RefreshResult {
    outcome.unwrap_or_else(|| {
        Err(RefreshFailure::Transient(
            "refresh task did not complete".into(),
        ))
    })
}
