//! Credential-issuing service client
//!
//! Handles the four auth endpoint interactions:
//! 1. Password sign-in (`/token?grant_type=password`)
//! 2. Sign-up (`/signup`)
//! 3. Refresh (`/token?grant_type=refresh_token`)
//! 4. Revocation (`/logout?scope=...`)
//!
//! All of them go through a plain `Transport` pointed at the auth base URL,
//! never through the authenticated pipeline, so a refresh call can not itself
//! be intercepted and refreshed.
//!
//! Non-success statuses come back as `Error::Status` with the raw status
//! code. Deciding whether a failed refresh is terminal is left to the caller.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use common::Secret;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Serialize;
use tracing::{debug, info};
use transport::{ApiRequest, ApiResponse, Transport};

use crate::constants::{
    GRANT_PASSWORD, GRANT_REFRESH_TOKEN, LOGOUT_PATH, SIGNUP_PATH, TOKEN_PATH,
};
use crate::error::{Error, Result};
use crate::token::{AuthUser, SessionToken, TokenResponse};

/// How a user identifies at sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Email(String),
    Phone(String),
}

/// Password sign-in input.
#[derive(Debug, Clone)]
pub struct SignInCredentials {
    pub identifier: Identifier,
    pub password: Secret<String>,
}

/// Sign-up input.
#[derive(Debug, Clone)]
pub struct SignUpCredentials {
    pub email: String,
    pub password: Secret<String>,
}

/// A freshly issued token with the user it belongs to.
#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub token: SessionToken,
    pub user: Option<AuthUser>,
}

/// Which sessions a revocation ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogoutScope {
    /// Only this client's session
    #[default]
    Local,
    /// Every session of the user
    Global,
    /// Every session except this one
    Others,
}

impl LogoutScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogoutScope::Local => "local",
            LogoutScope::Global => "global",
            LogoutScope::Others => "others",
        }
    }
}

/// The credential exchanges the session pipeline depends on.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn CredentialIssuer>`).
pub trait CredentialIssuer: Send + Sync {
    /// Exchange user credentials for a token (password grant).
    fn sign_in<'a>(
        &'a self,
        credentials: &'a SignInCredentials,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant>> + Send + 'a>>;

    /// Create an account and receive its first token.
    fn sign_up<'a>(
        &'a self,
        credentials: &'a SignUpCredentials,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant>> + Send + 'a>>;

    /// Exchange a refresh credential for a new token pair.
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SessionToken>> + Send + 'a>>;

    /// Tell the service the session is over.
    fn revoke<'a>(
        &'a self,
        token: &'a SessionToken,
        scope: LogoutScope,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

#[derive(Serialize)]
struct PasswordGrantBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshGrantBody<'a> {
    refresh_token: &'a str,
}

/// HTTP client for the credential-issuing service.
#[derive(Clone)]
pub struct AuthApi {
    transport: Arc<dyn Transport>,
}

impl AuthApi {
    /// `transport` must resolve relative paths against the auth base URL.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    async fn exchange(&self, request: ApiRequest) -> Result<TokenGrant> {
        let response = self.transport.send(request).await?;
        let (token, user) = parse_token_response(&response)?.into_session()?;
        Ok(TokenGrant { token, user })
    }
}

fn parse_token_response(response: &ApiResponse) -> Result<TokenResponse> {
    if !response.is_success() {
        return Err(Error::status(response.status.as_u16(), &response.text()));
    }
    response
        .json::<TokenResponse>()
        .map_err(|e| Error::InvalidResponse(format!("decoding token response: {e}")))
}

fn invalid_request(e: transport::TransportError) -> Error {
    Error::InvalidResponse(format!("building request: {e}"))
}

impl CredentialIssuer for AuthApi {
    fn sign_in<'a>(
        &'a self,
        credentials: &'a SignInCredentials,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant>> + Send + 'a>> {
        Box::pin(async move {
            let (email, phone) = match &credentials.identifier {
                Identifier::Email(email) => (Some(email.as_str()), None),
                Identifier::Phone(phone) => (None, Some(phone.as_str())),
            };
            let body = PasswordGrantBody {
                email,
                phone,
                password: credentials.password.expose(),
            };
            let request = ApiRequest::post(format!("{TOKEN_PATH}?grant_type={GRANT_PASSWORD}"))
                .json(&body)
                .map_err(invalid_request)?;
            let grant = self.exchange(request).await?;
            info!(user_id = ?grant.user.as_ref().map(|u| &u.id), "signed in");
            Ok(grant)
        })
    }

    fn sign_up<'a>(
        &'a self,
        credentials: &'a SignUpCredentials,
    ) -> Pin<Box<dyn Future<Output = Result<TokenGrant>> + Send + 'a>> {
        Box::pin(async move {
            let body = PasswordGrantBody {
                email: Some(credentials.email.as_str()),
                phone: None,
                password: credentials.password.expose(),
            };
            let request = ApiRequest::post(SIGNUP_PATH)
                .json(&body)
                .map_err(invalid_request)?;
            let grant = self.exchange(request).await?;
            info!(user_id = ?grant.user.as_ref().map(|u| &u.id), "signed up");
            Ok(grant)
        })
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SessionToken>> + Send + 'a>> {
        Box::pin(async move {
            let request =
                ApiRequest::post(format!("{TOKEN_PATH}?grant_type={GRANT_REFRESH_TOKEN}"))
                    .json(&RefreshGrantBody { refresh_token })
                    .map_err(invalid_request)?;
            let grant = self.exchange(request).await?;
            debug!(expires_at = grant.token.expires_at, "refresh exchange succeeded");
            Ok(grant.token)
        })
    }

    fn revoke<'a>(
        &'a self,
        token: &'a SessionToken,
        scope: LogoutScope,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let authorization = HeaderValue::from_str(&token.authorization())
                .map_err(|e| Error::InvalidResponse(format!("invalid token value: {e}")))?;
            let request =
                ApiRequest::post(format!("{LOGOUT_PATH}?scope={}", scope.as_str()))
                    .header(AUTHORIZATION, authorization);
            let response = self.transport.send(request).await?;
            if !response.is_success() {
                return Err(Error::status(response.status.as_u16(), &response.text()));
            }
            debug!(scope = scope.as_str(), "session revoked");
            Ok(())
        })
    }
}
