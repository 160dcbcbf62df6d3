//! Shared test doubles for the pipeline: a scripted API server, a fake
//! credential issuer and a recording reset strategy.

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::time::Duration;

use reqwest::StatusCode;
use session_auth::token::now_secs;
use session_auth::{
    AuthUser, CredentialIssuer, Error as AuthError, KeyValueStorage, LogoutScope, MemoryStorage,
    SessionToken, SignInCredentials, SignUpCredentials, TokenGrant, TokenStore,
};
use tokio::sync::{Notify, Semaphore};
use transport::{ApiRequest, ApiResponse, Transport, TransportError};

use crate::attacher::sent_authorization;
use crate::signout::{ResetStrategy, SignOutReason};

/// A token that expires an hour from now.
pub fn token(access: &str, refresh: &str) -> SessionToken {
    SessionToken::new(access, refresh, now_secs() + 3600, "bearer")
}

pub fn memory_store(initial: Option<SessionToken>) -> TokenStore {
    let store = TokenStore::new(Arc::new(MemoryStorage::new()));
    if let Some(token) = initial {
        store.put(&token).unwrap();
    }
    store
}

/// Storage that can be read and cleared but rejects every write.
pub struct FailingWrites {
    inner: Arc<MemoryStorage>,
}

impl FailingWrites {
    pub fn with_token(token: &SessionToken) -> Self {
        let inner = Arc::new(MemoryStorage::new());
        TokenStore::new(inner.clone()).put(token).unwrap();
        Self { inner }
    }
}

impl KeyValueStorage for FailingWrites {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        self.inner.get_item(key)
    }

    fn set_item(&self, _key: &str, _value: &str) -> io::Result<()> {
        Err(io::Error::other("storage quota exceeded"))
    }

    fn remove_item(&self, key: &str) -> io::Result<()> {
        self.inner.remove_item(key)
    }
}

/// Storage whose removals block until released, to hold a sign-out in the
/// middle of clearing the store.
pub struct HeldRemoval {
    inner: MemoryStorage,
    removing: Notify,
    release_tx: Mutex<mpsc::Sender<()>>,
    release_rx: Mutex<mpsc::Receiver<()>>,
}

impl HeldRemoval {
    pub fn new() -> Self {
        let (release_tx, release_rx) = mpsc::channel();
        Self {
            inner: MemoryStorage::new(),
            removing: Notify::new(),
            release_tx: Mutex::new(release_tx),
            release_rx: Mutex::new(release_rx),
        }
    }

    /// Resolves once a removal is blocked.
    pub async fn removing(&self) {
        self.removing.notified().await;
    }

    /// Let one blocked removal proceed.
    pub fn release(&self) {
        self.release_tx.lock().unwrap().send(()).unwrap();
    }
}

impl KeyValueStorage for HeldRemoval {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        self.inner.set_item(key, value)
    }

    fn remove_item(&self, key: &str) -> io::Result<()> {
        self.removing.notify_one();
        self.release_rx.lock().unwrap().recv().unwrap();
        self.inner.remove_item(key)
    }
}

/// Resource server that accepts exactly one `Authorization` value.
///
/// Every other value gets 401, unless a fixed status or a transport failure
/// is scripted.
pub struct ApiServer {
    accepted: Mutex<String>,
    fixed: Mutex<Option<StatusCode>>,
    unreachable: Mutex<bool>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ApiServer {
    pub fn accepting(authorization: &str) -> Arc<Self> {
        Arc::new(Self {
            accepted: Mutex::new(authorization.to_string()),
            fixed: Mutex::new(None),
            unreachable: Mutex::new(false),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn accept(&self, authorization: &str) {
        *self.accepted.lock().unwrap() = authorization.to_string();
    }

    /// Answer every request with `status`.
    pub fn always(&self, status: StatusCode) {
        *self.fixed.lock().unwrap() = Some(status);
    }

    pub fn go_offline(&self) {
        *self.unreachable.lock().unwrap() = true;
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The `Authorization` value of every request received, in order.
    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| sent_authorization(&r.headers).map(str::to_string))
            .collect()
    }
}

impl Transport for ApiServer {
    fn send(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = transport::Result<ApiResponse>> + Send + '_>> {
        Box::pin(async move {
            let authorization = sent_authorization(&request.headers).map(str::to_string);
            self.requests.lock().unwrap().push(request);

            if *self.unreachable.lock().unwrap() {
                return Err(TransportError::Connect("connection refused".into()));
            }
            if let Some(status) = *self.fixed.lock().unwrap() {
                return Ok(ApiResponse::new(status, "scripted"));
            }
            let accepted = self.accepted.lock().unwrap().clone();
            if authorization.as_deref() == Some(accepted.as_str()) {
                Ok(ApiResponse::new(StatusCode::OK, r#"{"ok":true}"#))
            } else {
                Ok(ApiResponse::new(
                    StatusCode::UNAUTHORIZED,
                    r#"{"error":"invalid_token"}"#,
                ))
            }
        })
    }
}

/// What the fake issuer does on refresh.
#[derive(Debug, Clone)]
pub enum RefreshBehavior {
    Issue(SessionToken),
    Reject(u16),
    Timeout,
}

/// Credential issuer with scripted refresh and counted calls.
pub struct FakeIssuer {
    behavior: Mutex<RefreshBehavior>,
    grant: Mutex<Option<SessionToken>>,
    delay: Duration,
    gate: Option<Arc<Semaphore>>,
    fail_revoke: bool,
    refreshed_with: Mutex<Vec<String>>,
    revoked: Mutex<Vec<(String, LogoutScope)>>,
    sign_ins: AtomicUsize,
}

impl FakeIssuer {
    /// Issues `a2`/`r2` on refresh and `a1`/`r1` on sign-in.
    pub fn new() -> Self {
        Self {
            behavior: Mutex::new(RefreshBehavior::Issue(token("a2", "r2"))),
            grant: Mutex::new(Some(token("a1", "r1"))),
            delay: Duration::ZERO,
            gate: None,
            fail_revoke: false,
            refreshed_with: Mutex::new(Vec::new()),
            revoked: Mutex::new(Vec::new()),
            sign_ins: AtomicUsize::new(0),
        }
    }

    pub fn refreshing_with(self, behavior: RefreshBehavior) -> Self {
        *self.behavior.lock().unwrap() = behavior;
        self
    }

    /// Sleep this long inside every refresh.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Hold every refresh until the semaphore hands out a permit.
    pub fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn failing_revoke(mut self) -> Self {
        self.fail_revoke = true;
        self
    }

    /// Reject sign-in and sign-up with 400.
    pub fn rejecting_sign_in(self) -> Self {
        *self.grant.lock().unwrap() = None;
        self
    }

    pub fn set_behavior(&self, behavior: RefreshBehavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn refresh_calls(&self) -> usize {
        self.refreshed_with.lock().unwrap().len()
    }

    /// Refresh credentials presented, in order.
    pub fn refreshed_with(&self) -> Vec<String> {
        self.refreshed_with.lock().unwrap().clone()
    }

    pub fn revoke_calls(&self) -> usize {
        self.revoked.lock().unwrap().len()
    }

    /// Access credential and scope of every revocation.
    pub fn revoked(&self) -> Vec<(String, LogoutScope)> {
        self.revoked.lock().unwrap().clone()
    }

    pub fn sign_in_calls(&self) -> usize {
        self.sign_ins.load(Ordering::SeqCst)
    }

    fn issue_grant(&self) -> session_auth::Result<TokenGrant> {
        self.sign_ins.fetch_add(1, Ordering::SeqCst);
        match self.grant.lock().unwrap().clone() {
            Some(token) => Ok(TokenGrant {
                token,
                user: Some(AuthUser {
                    id: "u1".into(),
                    email: Some("user@example.com".into()),
                    phone: None,
                }),
            }),
            None => Err(AuthError::status(400, r#"{"error":"invalid_grant"}"#)),
        }
    }
}

impl CredentialIssuer for FakeIssuer {
    fn sign_in<'a>(
        &'a self,
        _credentials: &'a SignInCredentials,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<TokenGrant>> + Send + 'a>> {
        Box::pin(async move { self.issue_grant() })
    }

    fn sign_up<'a>(
        &'a self,
        _credentials: &'a SignUpCredentials,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<TokenGrant>> + Send + 'a>> {
        Box::pin(async move { self.issue_grant() })
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<SessionToken>> + Send + 'a>> {
        Box::pin(async move {
            self.refreshed_with
                .lock()
                .unwrap()
                .push(refresh_token.to_string());
            if let Some(gate) = &self.gate {
                let _permit = gate.acquire().await.unwrap();
            }
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let behavior = self.behavior.lock().unwrap().clone();
            match behavior {
                RefreshBehavior::Issue(token) => Ok(token),
                RefreshBehavior::Reject(status) => {
                    Err(AuthError::status(status, r#"{"error":"invalid_grant"}"#))
                }
                RefreshBehavior::Timeout => Err(AuthError::Timeout("8s elapsed".into())),
            }
        })
    }

    fn revoke<'a>(
        &'a self,
        token: &'a SessionToken,
        scope: LogoutScope,
    ) -> Pin<Box<dyn Future<Output = session_auth::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.revoked
                .lock()
                .unwrap()
                .push((token.access_token.expose().to_string(), scope));
            if self.fail_revoke {
                Err(AuthError::Http("connection reset".into()))
            } else {
                Ok(())
            }
        })
    }
}

/// Reset strategy that remembers every reason it was called with.
#[derive(Default)]
pub struct RecordingReset {
    reasons: Mutex<Vec<SignOutReason>>,
}

impl RecordingReset {
    pub fn reasons(&self) -> Vec<SignOutReason> {
        self.reasons.lock().unwrap().clone()
    }
}

impl ResetStrategy for RecordingReset {
    fn reset(&self, reason: SignOutReason) {
        self.reasons.lock().unwrap().push(reason);
    }
}
