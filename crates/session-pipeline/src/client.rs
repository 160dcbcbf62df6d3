//! Authenticated client: the pipeline as a drop-in `Transport`
//!
//! Every request gets the current credential attached, is sent through the
//! underlying transport, and has its response resolved by the refresh
//! coordinator. Callers see either the final response or a transport error;
//! refreshes, retries and forced sign-outs happen underneath.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use session_auth::{
    AuthUser, CredentialIssuer, SessionToken, SignInCredentials, SignUpCredentials, TokenStore,
};
use tracing::{debug, instrument};
use transport::{ApiRequest, ApiResponse, Transport};

use crate::attacher::attach;
use crate::coordinator::RefreshCoordinator;
use crate::error::Result;
use crate::signout::{SignOutPolicy, SignOutReason};

/// Cheap to clone; clones share the store and the pending refresh.
#[derive(Clone)]
pub struct AuthenticatedClient {
    transport: Arc<dyn Transport>,
    store: TokenStore,
    issuer: Arc<dyn CredentialIssuer>,
    sign_out: Arc<SignOutPolicy>,
    coordinator: Arc<RefreshCoordinator>,
}

impl AuthenticatedClient {
    /// Client with the default sign-out policy (local revocation, log-only
    /// reset).
    pub fn new(
        transport: Arc<dyn Transport>,
        store: TokenStore,
        issuer: Arc<dyn CredentialIssuer>,
    ) -> Self {
        let policy = SignOutPolicy::new(store.clone(), Arc::clone(&issuer));
        Self::with_sign_out_policy(transport, store, issuer, policy)
    }

    /// Client whose forced and explicit sign-outs go through `policy`.
    /// The policy must clear the same `store`.
    pub fn with_sign_out_policy(
        transport: Arc<dyn Transport>,
        store: TokenStore,
        issuer: Arc<dyn CredentialIssuer>,
        policy: SignOutPolicy,
    ) -> Self {
        let sign_out = Arc::new(policy);
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&transport),
            store.clone(),
            Arc::clone(&issuer),
            Arc::clone(&sign_out),
        ));
        Self {
            transport,
            store,
            issuer,
            sign_out,
            coordinator,
        }
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Whether a usable session is stored. Never touches the network.
    pub fn is_authenticated(&self) -> bool {
        self.store.is_present()
    }

    /// The stored session, if any.
    pub fn session(&self) -> Option<SessionToken> {
        self.store.get()
    }

    /// Exchange user credentials for a session and persist it.
    pub async fn sign_in(&self, credentials: &SignInCredentials) -> Result<Option<AuthUser>> {
        let grant = self.issuer.sign_in(credentials).await?;
        self.coordinator.wait_idle().await;
        self.store.put(&grant.token)?;
        debug!("session stored");
        Ok(grant.user)
    }

    /// Create an account and persist its first session.
    pub async fn sign_up(&self, credentials: &SignUpCredentials) -> Result<Option<AuthUser>> {
        let grant = self.issuer.sign_up(credentials).await?;
        self.coordinator.wait_idle().await;
        self.store.put(&grant.token)?;
        debug!("session stored");
        Ok(grant.user)
    }

    /// Renew the session now instead of waiting for a 401.
    pub async fn refresh(&self) -> Result<SessionToken> {
        self.coordinator.refresh_now().await
    }

    /// End the session. A refresh already in flight finishes first so the
    /// renewed credential is the one revoked; one that starts later finds
    /// the session gone and stores nothing.
    pub async fn sign_out(&self) {
        self.coordinator.wait_idle().await;
        self.sign_out.sign_out(SignOutReason::UserInitiated).await;
    }

    /// Wait for revocations still running after a forced sign-out, so they
    /// are not cut off when the process exits.
    pub async fn finish_revocations(&self) {
        self.sign_out.finish_revocations().await;
    }

    #[instrument(skip_all, fields(request_id = %request_id, method = %request.method, url = %request.url))]
    async fn execute(
        &self,
        mut request: ApiRequest,
        request_id: String,
    ) -> transport::Result<ApiResponse> {
        attach(&self.store, &mut request.headers);
        let response = self.transport.send(request.clone()).await?;
        debug!(status = response.status.as_u16(), "response received");
        self.coordinator.handle(request, response).await
    }
}

impl Transport for AuthenticatedClient {
    fn send(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = transport::Result<ApiResponse>> + Send + '_>> {
        let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
        Box::pin(self.execute(request, request_id))
    }
}
