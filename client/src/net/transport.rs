//! HTTP transport seam under the API client.
//!
//! `ApiClient` builds fully-authorized [`ApiRequest`]s and hands them to an
//! [`HttpTransport`]. Native builds send with `reqwest`; under `hydrate` the
//! browser's fetch does it through `gloo-net`. Tests substitute a scripted
//! mock.

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, COOKIE};
use serde_json::Value;

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// One outgoing call, after authorization headers have been attached.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/auth/login`.
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    /// `Cookie` header value standing in for `credentials: include`.
    pub cookies: Option<String>,
    pub timeout: Duration,
}

impl ApiRequest {
    /// First header named `name`, case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and decoded JSON body (if any) of a completed call.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request timed out")]
    TimedOut,
    #[error("http client build failed: {0}")]
    Build(String),
    #[error("transport error: {0}")]
    Other(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError>;
}

// =============================================================================
// REQWEST
// =============================================================================

pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns [`TransportError::Build`] if the TLS backend cannot initialize.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| TransportError::Build(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self
            .http
            .request(request.method, &url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(cookies) = &request.cookies {
            builder = builder.header(COOKIE, cookies.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.to_string());
        }

        let resp = builder.send().await.map_err(classify)?;
        let status = resp.status().as_u16();
        let content_type = resp.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()).map(str::to_owned);
        let bytes = resp.bytes().await.map_err(classify)?;
        Ok(RawResponse { status, body: decode_body(status, content_type.as_deref(), &bytes) })
    }
}

/// JSON body of a response, when it declares one and it parses.
pub(crate) fn decode_body(status: u16, content_type: Option<&str>, bytes: &[u8]) -> Option<Value> {
    if !content_type.is_some_and(|v| v.contains("json")) || bytes.is_empty() {
        return None;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!(status, error = %e, "response body is not valid json");
            None
        }
    }
}

fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::TimedOut
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}

// =============================================================================
// FETCH (hydrate)
// =============================================================================

/// Browser fetch through `gloo-net`, with `credentials: include` so the
/// credential cookies travel with every call.
#[cfg(feature = "hydrate")]
pub struct FetchTransport {
    base_url: String,
}

#[cfg(feature = "hydrate")]
impl FetchTransport {
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self { base_url: base_url.trim_end_matches('/').to_owned() }
    }
}

#[cfg(feature = "hydrate")]
#[async_trait]
impl HttpTransport for FetchTransport {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, TransportError> {
        let url = format!("{}{}", self.base_url, request.path);
        // Fetch futures are not Send; run the call on the page's event loop
        // and wait for its result over a channel.
        let (tx, rx) = futures::channel::oneshot::channel();
        wasm_bindgen_futures::spawn_local(async move {
            let _ = tx.send(fetch(&url, request).await);
        });
        rx.await.map_err(|_| TransportError::Other("fetch abandoned".to_owned()))?
    }
}

#[cfg(feature = "hydrate")]
async fn fetch(url: &str, request: ApiRequest) -> Result<RawResponse, TransportError> {
    use gloo_net::http::Request;

    let mut builder = match request.method.as_str() {
        "GET" => Request::get(url),
        "POST" => Request::post(url),
        "PUT" => Request::put(url),
        "PATCH" => Request::patch(url),
        "DELETE" => Request::delete(url),
        other => return Err(TransportError::Other(format!("unsupported method {other}"))),
    }
    .credentials(web_sys::RequestCredentials::Include);
    for (name, value) in &request.headers {
        builder = builder.header(name, value);
    }
    let outgoing = match &request.body {
        Some(body) => builder.body(body.to_string()),
        None => builder.build(),
    }
    .map_err(|e| TransportError::Build(e.to_string()))?;

    let resp = outgoing.send().await.map_err(|e| TransportError::Connect(e.to_string()))?;
    let status = resp.status();
    let content_type = resp.headers().get("content-type");
    let bytes = resp.binary().await.map_err(|e| TransportError::Other(e.to_string()))?;
    Ok(RawResponse { status, body: decode_body(status, content_type.as_deref(), &bytes) })
}
