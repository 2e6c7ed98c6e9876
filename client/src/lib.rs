//! Browser-side auth session runtime for Camply.
//!
//! SYSTEM CONTEXT
//! ==============
//! Owns the credential cookies, the observable session, the request
//! authorizer and the auth operations. The edge guard in `server` reads the
//! same cookies on every navigation; nothing else is shared between the two.
//!
//! ```text
//! user action -> AuthService -> ApiClient -> backend
//!                    |
//!                    v
//!              SessionState --(observers)--> RefreshScheduler
//!                    |
//!                    v
//!               TokenStore (auth-token / refresh-token cookies)
//! ```
//!
//! Native builds run on tokio and send with `reqwest`. The `hydrate` feature
//! targets the browser: fetch through `gloo-net`, timers and tasks on the
//! page's event loop, `document.cookie` and `localStorage` media, and the
//! Google and Facebook SDK adapters.

pub mod auth;
pub mod config;
pub mod net;
pub mod runtime;
pub mod social;
pub mod state;

use std::sync::Arc;

use auth::AuthService;
use config::ClientConfig;
use net::api::ApiClient;
#[cfg(feature = "hydrate")]
use net::transport::FetchTransport;
use net::transport::TransportError;
#[cfg(not(feature = "hydrate"))]
use net::transport::ReqwestTransport;
use social::SocialBridge;
#[cfg(feature = "hydrate")]
use social::browser::{FacebookSdk, GoogleIdentity};
#[cfg(feature = "hydrate")]
use social::{Provider, SocialIdentityProvider};
use state::session::SessionState;
use state::storage::{CookieBackend, KeyValueStorage};
use state::token_store::TokenStore;

/// Assemble the auth runtime over the given storage media.
///
/// Call [`AuthService::bootstrap`] on the result before first use.
///
/// # Errors
///
/// Fails only if the HTTP client cannot be constructed.
pub fn build(
    config: &ClientConfig,
    cookies: Arc<dyn CookieBackend>,
    mirror: Arc<dyn KeyValueStorage>,
) -> Result<Arc<AuthService>, TransportError> {
    #[cfg(not(feature = "hydrate"))]
    let transport = ReqwestTransport::new(&config.api_base_url)?;
    #[cfg(feature = "hydrate")]
    let transport = FetchTransport::new(&config.api_base_url);
    let store = TokenStore::new(cookies, config.secure_cookies());
    let session = SessionState::new(store.clone(), mirror);
    let api = ApiClient::new(Arc::new(transport), store).with_timeout(config.api_timeout);
    Ok(AuthService::new(api, session))
}

/// A social bridge honouring the configured sign-in timeout.
///
/// Under `hydrate` every provider with a configured id gets its browser SDK
/// adapter. Elsewhere the bridge starts empty; register adapters with
/// [`SocialBridge::with_adapter`].
#[must_use]
pub fn social_bridge(config: &ClientConfig) -> SocialBridge {
    let bridge = SocialBridge::new().with_login_timeout(config.social_timeout);
    #[cfg(feature = "hydrate")]
    let bridge = social::sdk::configured(config).into_iter().fold(bridge, |bridge, (provider, id)| {
        let adapter: Arc<dyn SocialIdentityProvider> = match provider {
            Provider::Google => Arc::new(GoogleIdentity::new(id)),
            Provider::Facebook => Arc::new(FacebookSdk::new(id)),
        };
        tracing::debug!(%provider, "social sdk adapter registered");
        bridge.with_adapter(adapter)
    });
    bridge
}
