//! reqwest-backed transport.
//!
//! Resolves relative URLs against a base URL, applies a per-request timeout
//! and reads the whole body before returning. Error statuses are returned as
//! responses; only I/O level failures become `TransportError`.

use crate::{ApiRequest, ApiResponse, Result, Transport, TransportError};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::debug;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(8);

/// HTTP transport over a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Join a request URL onto the base URL unless it is already absolute.
    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            url.trim_start_matches('/')
        )
    }
}

fn map_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else if e.is_builder() {
        TransportError::InvalidRequest(e.to_string())
    } else {
        TransportError::Request(e.to_string())
    }
}

impl Transport for ReqwestTransport {
    fn send(
        &self,
        request: ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + '_>> {
        Box::pin(async move {
            let url = self.resolve(&request.url);
            let mut builder = self
                .client
                .request(request.method.clone(), &url)
                .headers(request.headers)
                .timeout(self.timeout);
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await.map_err(map_error)?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(map_error)?;

            debug!(method = %request.method, url = %url, status = status.as_u16(), "request completed");

            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        })
    }
}
