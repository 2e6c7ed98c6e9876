//! REST client for the Camply backend.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every backend call made by the auth operations goes through [`ApiClient`].
//! It reads the token store at call time, so a credential written by a login
//! that finished a moment ago is used by the very next request.
//!
//! DESIGN
//! ======
//! - `Authorization: Bearer` is attached unless the call is anonymous.
//! - `X-Client-Auth` reports whether an access credential is held. It is a
//!   UX hint for the edge guard, never an authorization input.
//! - The credential cookies are always sent along (`credentials: include`).
//! - A 401 answering a request whose bearer is still the stored credential
//!   fires the unauthorized hook, which the auth service wires to a forced
//!   sign-out.

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use credential::{BEARER, CLIENT_AUTH_HEADER};
use reqwest::Method;
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde_json::Value;

use super::error::ApiError;
use super::transport::{ApiRequest, HttpTransport};
use crate::runtime;
use crate::state::token_store::{TokenKind, TokenStore};

/// Per-call bound when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

const AUTHORIZATION: &str = "authorization";

/// Per-call switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Do not attach `Authorization`. Used by credential-acquiring calls.
    pub skip_auth: bool,
    /// Override the client-wide timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    #[must_use]
    pub fn anonymous() -> Self {
        Self { skip_auth: true, timeout: None }
    }
}

type UnauthorizedHook = Arc<dyn Fn() + Send + Sync>;

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    store: TokenStore,
    timeout: Duration,
    on_unauthorized: Arc<Mutex<Option<UnauthorizedHook>>>,
}

impl ApiClient {
    #[must_use]
    pub fn new(transport: Arc<dyn HttpTransport>, store: TokenStore) -> Self {
        Self { transport, store, timeout: DEFAULT_TIMEOUT, on_unauthorized: Arc::new(Mutex::new(None)) }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    /// Install the callback run when the current credential is rejected.
    pub fn set_unauthorized_handler<F>(&self, handler: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.on_unauthorized.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(handler));
    }

    // =========================================================================
    // REQUEST BUILDING
    // =========================================================================

    /// Build a request with the authorization headers for the current credential.
    #[must_use]
    pub fn prepare(&self, method: Method, path: &str, body: Option<Value>, options: RequestOptions) -> ApiRequest {
        let access = self.store.get(TokenKind::Access);

        let mut headers = vec![
            ("content-type".to_owned(), "application/json".to_owned()),
            (CLIENT_AUTH_HEADER.to_owned(), access.is_some().to_string()),
        ];
        if !options.skip_auth {
            if let Some(token) = &access {
                headers.push((AUTHORIZATION.to_owned(), format!("{BEARER} {token}")));
            }
        }

        ApiRequest {
            method,
            path: path.to_owned(),
            headers,
            body,
            cookies: self.store.cookie_header(),
            timeout: options.timeout.unwrap_or(self.timeout),
        }
    }

    /// Send a prepared request and classify the outcome.
    ///
    /// # Errors
    ///
    /// Any non-2xx status, transport failure, or timeout as an [`ApiError`].
    pub async fn dispatch(&self, request: ApiRequest) -> Result<Option<Value>, ApiError> {
        let bound = request.timeout;
        let bearer = request.header(AUTHORIZATION).map(str::to_owned);
        let method = request.method.clone();
        let path = request.path.clone();

        let outcome = runtime::timeout(bound, self.transport.send(request)).await;
        let response = match outcome {
            Err(_) => {
                tracing::warn!(%method, %path, timeout_ms = bound.as_millis(), "api call timed out");
                return Err(ApiError::Timeout(bound));
            }
            Ok(Err(e)) => {
                tracing::warn!(%method, %path, error = %e, "api call failed");
                return Err(ApiError::from_transport(e, bound));
            }
            Ok(Ok(response)) => response,
        };

        tracing::debug!(%method, %path, status = response.status, "api call completed");
        if (200..300).contains(&response.status) {
            return Ok(response.body);
        }

        if response.status == 401 {
            self.credential_rejected(bearer.as_deref());
        }
        Err(ApiError::from_status(response.status, response.body.as_ref()))
    }

    fn credential_rejected(&self, sent_bearer: Option<&str>) {
        let Some(sent) = sent_bearer.and_then(|b| b.strip_prefix(BEARER)).map(str::trim) else {
            return;
        };
        // A 401 for a credential that has since been replaced says nothing
        // about the current one.
        if self.store.get(TokenKind::Access).as_deref() != Some(sent) {
            return;
        }
        let hook = self.on_unauthorized.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(hook) = hook {
            tracing::info!("stored credential rejected by backend; signing out");
            hook();
        }
    }

    // =========================================================================
    // TYPED CALLS
    // =========================================================================

    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch); also [`ApiError::Decode`] when the
    /// body does not match `T`.
    pub async fn send<B, T>(&self, method: Method, path: &str, body: Option<&B>, options: RequestOptions) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        let request = self.prepare(method, path, body, options);
        let value = self.dispatch(request).await?;
        decode_envelope(value)
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn post<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::POST, path, Some(body), options).await
    }

    /// # Errors
    ///
    /// See [`send`](Self::send).
    pub async fn put<B, T>(&self, path: &str, body: &B, options: RequestOptions) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(Method::PUT, path, Some(body), options).await
    }

    /// POST whose response body is ignored.
    ///
    /// # Errors
    ///
    /// See [`dispatch`](Self::dispatch).
    pub async fn post_unit<B>(&self, path: &str, body: &B, options: RequestOptions) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        let _: IgnoredAny = self.send(Method::POST, path, Some(body), options).await?;
        Ok(())
    }
}

/// Decode a body that may be wrapped as `{ "data": ... }`.
fn decode_envelope<T: DeserializeOwned>(body: Option<Value>) -> Result<T, ApiError> {
    let value = body.unwrap_or(Value::Null);
    if let Some(inner) = value.get("data") {
        if let Ok(decoded) = T::deserialize(inner) {
            return Ok(decoded);
        }
    }
    serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
}
