//! Transport abstraction for outbound HTTP calls
//!
//! Defines the `Transport` trait that decouples the session pipeline from the
//! HTTP client doing the actual I/O. `ReqwestTransport` is the production
//! implementation; the authenticated client in `session-pipeline` implements
//! the same trait so callers can swap one for the other.
//!
//! Requests and responses are plain owned values (`ApiRequest`,
//! `ApiResponse`) so a failed request can be cloned and re-issued after a
//! credential refresh.

pub mod reqwest_transport;

pub use reqwest_transport::ReqwestTransport;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;

/// Errors from the transport layer itself. HTTP error statuses are not
/// errors here; they come back as an `ApiResponse`.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// An outbound request.
///
/// `url` is either absolute or a path joined onto the transport's base URL.
/// The `retried` marker is set by the refresh coordinator when it re-issues a
/// request, so a second authorization failure is never refreshed again.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Set a header, replacing any existing value.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serialize `value` as the JSON body and set the content type.
    pub fn json<T: Serialize + ?Sized>(mut self, value: &T) -> Result<Self> {
        let body = serde_json::to_vec(value)
            .map_err(|e| TransportError::InvalidRequest(format!("serializing body: {e}")))?;
        self.headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Some(Bytes::from(body));
        Ok(self)
    }

    /// Whether this request is already a post-refresh retry.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// A fully-read response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as UTF-8 text, lossy.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_slice(&self.body)
    }
}

/// Abstraction over the HTTP client.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    /// Send the request and read the full response.
    fn send(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + '_>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_request_is_not_retried() {
        let mut request = ApiRequest::get("/v1/users/profile");
        assert!(!request.is_retried());
        request.mark_retried();
        assert!(request.is_retried());
    }

    #[test]
    fn retried_marker_survives_clone() {
        let mut request = ApiRequest::get("/v1/users/profile");
        request.mark_retried();
        assert!(request.clone().is_retried());
    }

    #[test]
    fn json_body_sets_content_type() {
        let request = ApiRequest::post("/token")
            .json(&serde_json::json!({"refresh_token": "rt_1"}))
            .unwrap();
        assert_eq!(
            request.headers.get(reqwest::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(
            request.body.as_deref().unwrap(),
            br#"{"refresh_token":"rt_1"}"#
        );
    }

    #[test]
    fn header_replaces_existing_value() {
        let request = ApiRequest::get("/x")
            .header(
                reqwest::header::AUTHORIZATION,
                HeaderValue::from_static("Bearer old"),
            )
            .header(
                reqwest::header::AUTHORIZATION,
                HeaderValue::from_static("Bearer new"),
            );
        assert_eq!(
            request.headers.get(reqwest::header::AUTHORIZATION).unwrap(),
            "Bearer new"
        );
        assert_eq!(request.headers.len(), 1);
    }

    #[test]
    fn response_decodes_json_and_text() {
        let response = ApiResponse::new(StatusCode::OK, r#"{"id":"u1"}"#);
        assert!(response.is_success());
        assert_eq!(response.text(), r#"{"id":"u1"}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["id"], "u1");
    }

    #[test]
    fn unauthorized_response_is_not_success() {
        let response = ApiResponse::new(StatusCode::UNAUTHORIZED, "");
        assert!(!response.is_success());
    }
}
