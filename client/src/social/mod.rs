//! Social provider bridge.
//!
//! SYSTEM CONTEXT
//! ==============
//! Google and Facebook sign-in run through vendor SDKs loaded on demand. The
//! bridge owns their load lifecycle and turns each vendor's callback style
//! into a single [`SocialCredential`] that `AuthService::social_login`
//! exchanges for a session.
//!
//! DESIGN
//! ======
//! Per provider: `unloaded -> loading -> ready | failed`. A load in progress
//! is a shared future, so concurrent callers inject the script once. A failed
//! load stays failed until [`SocialBridge::reload`].
//!
//! TRADE-OFFS
//! ==========
//! Readiness is detected by polling the adapter rather than by SDK callbacks,
//! because neither vendor fires a reliable "ready" event.

#[cfg(feature = "hydrate")]
pub mod browser;
pub mod provider;
pub mod sdk;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::runtime;

pub use provider::{Provider, ProviderStatus, SocialIdentityProvider};

/// Interval between SDK readiness checks.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a loaded script may take to expose a callable SDK.
pub const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Bound on one complete sign-in interaction.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SocialError {
    #[error("{0} sign-in is not configured")]
    NotConfigured(Provider),
    #[error("unknown social provider: {0}")]
    UnknownProvider(String),
    #[error("failed to load the {provider} sdk: {reason}")]
    LoadFailed { provider: Provider, reason: String },
    #[error("the {0} sdk never became available")]
    SdkUnavailable(Provider),
    #[error("{0} sign-in timed out")]
    Timeout(Provider),
    #[error("{0} sign-in was dismissed")]
    Dismissed(Provider),
    #[error("{0} sign-in was cancelled")]
    Cancelled(Provider),
}

impl SocialError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured(p) => format!("{} sign-in is not available", p.label()),
            Self::UnknownProvider(_) => "Unsupported sign-in provider".to_owned(),
            Self::LoadFailed { provider, .. } | Self::SdkUnavailable(provider) => {
                format!("Could not load {} sign-in, please try again", provider.label())
            }
            Self::Timeout(p) => format!("{} sign-in timed out, please try again", p.label()),
            Self::Dismissed(p) | Self::Cancelled(p) => format!("{} sign-in was cancelled", p.label()),
        }
    }
}

/// Normalized provider result: the token to exchange, plus an id token when
/// the provider issues one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialCredential {
    pub credential: String,
    pub id_token: Option<String>,
}

/// Observable load state of one provider's SDK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready,
    Failed(SocialError),
}

type LoadFuture = Shared<BoxFuture<'static, Result<(), SocialError>>>;

enum Slot {
    Loading { generation: u64, future: LoadFuture },
    Ready,
    Failed(SocialError),
}

#[derive(Default)]
struct Slots {
    by_provider: BTreeMap<Provider, Slot>,
    generation: u64,
}

pub struct SocialBridge {
    adapters: BTreeMap<Provider, Arc<dyn SocialIdentityProvider>>,
    slots: Mutex<Slots>,
    login_timeout: Duration,
}

impl Default for SocialBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl SocialBridge {
    #[must_use]
    pub fn new() -> Self {
        Self { adapters: BTreeMap::new(), slots: Mutex::new(Slots::default()), login_timeout: LOGIN_TIMEOUT }
    }

    /// Register the adapter for its provider. Providers without an adapter
    /// report [`SocialError::NotConfigured`].
    #[must_use]
    pub fn with_adapter(mut self, adapter: Arc<dyn SocialIdentityProvider>) -> Self {
        self.adapters.insert(adapter.provider(), adapter);
        self
    }

    #[must_use]
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    #[must_use]
    pub fn is_configured(&self, provider: Provider) -> bool {
        self.adapters.contains_key(&provider)
    }

    #[must_use]
    pub fn state(&self, provider: Provider) -> LoadState {
        match self.lock().by_provider.get(&provider) {
            None => LoadState::Unloaded,
            Some(Slot::Loading { .. }) => LoadState::Loading,
            Some(Slot::Ready) => LoadState::Ready,
            Some(Slot::Failed(e)) => LoadState::Failed(e.clone()),
        }
    }

    // =========================================================================
    // LOAD LIFECYCLE
    // =========================================================================

    /// Load the provider's SDK, joining a load already in flight.
    ///
    /// # Errors
    ///
    /// The load failure, including a remembered one from an earlier attempt.
    pub async fn load(&self, provider: Provider) -> Result<(), SocialError> {
        let adapter = self.adapter(provider)?;

        let (generation, future) = {
            let mut slots = self.lock();
            match slots.by_provider.get(&provider) {
                Some(Slot::Ready) => return Ok(()),
                Some(Slot::Failed(e)) => return Err(e.clone()),
                Some(Slot::Loading { generation, future }) => (*generation, future.clone()),
                None => {
                    slots.generation += 1;
                    let generation = slots.generation;
                    let future = load_sdk(adapter).boxed().shared();
                    slots.by_provider.insert(provider, Slot::Loading { generation, future: future.clone() });
                    (generation, future)
                }
            }
        };

        let result = future.await;

        let mut slots = self.lock();
        let still_current =
            matches!(slots.by_provider.get(&provider), Some(Slot::Loading { generation: g, .. }) if *g == generation);
        if still_current {
            let settled = match &result {
                Ok(()) => Slot::Ready,
                Err(e) => Slot::Failed(e.clone()),
            };
            slots.by_provider.insert(provider, settled);
        }
        result
    }

    /// Forget a failed load and try again.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load).
    pub async fn reload(&self, provider: Provider) -> Result<(), SocialError> {
        {
            let mut slots = self.lock();
            if matches!(slots.by_provider.get(&provider), Some(Slot::Failed(_))) {
                slots.by_provider.remove(&provider);
            }
        }
        self.load(provider).await
    }

    /// Return the provider to `unloaded` and remove its script.
    pub fn unload(&self, provider: Provider) {
        self.lock().by_provider.remove(&provider);
        if let Some(adapter) = self.adapters.get(&provider) {
            adapter.remove_script();
            tracing::debug!(%provider, "identity sdk unloaded");
        }
    }

    // =========================================================================
    // SIGN-IN
    // =========================================================================

    /// Run the provider's interactive sign-in and normalize its result.
    ///
    /// # Errors
    ///
    /// [`SocialError::Timeout`] when the whole interaction exceeds the login
    /// timeout; otherwise the load or flow failure.
    pub async fn invoke_login(&self, provider: Provider) -> Result<SocialCredential, SocialError> {
        let adapter = self.adapter(provider)?;

        let flow = async {
            self.load(provider).await?;
            match provider {
                Provider::Google => google_flow(adapter.as_ref()).await,
                Provider::Facebook => facebook_flow(adapter.as_ref()).await,
            }
        };

        match runtime::timeout(self.login_timeout, flow).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(%provider, "social sign-in timed out");
                Err(SocialError::Timeout(provider))
            }
        }
    }

    fn adapter(&self, provider: Provider) -> Result<Arc<dyn SocialIdentityProvider>, SocialError> {
        self.adapters.get(&provider).cloned().ok_or(SocialError::NotConfigured(provider))
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn load_sdk(adapter: Arc<dyn SocialIdentityProvider>) -> Result<(), SocialError> {
    let provider = adapter.provider();
    tracing::info!(%provider, "loading identity sdk");
    adapter.inject_script().await?;

    let ready = runtime::timeout(READY_TIMEOUT, async {
        while !adapter.is_callable() {
            runtime::sleep(READY_POLL_INTERVAL).await;
        }
    })
    .await;
    if ready.is_err() {
        tracing::warn!(%provider, "identity sdk loaded but never became callable");
        return Err(SocialError::SdkUnavailable(provider));
    }

    adapter.initialize().await
}

fn connected(status: ProviderStatus) -> Option<SocialCredential> {
    match status {
        ProviderStatus::Connected { access_token, id_token } => {
            Some(SocialCredential { credential: access_token, id_token })
        }
        _ => None,
    }
}

/// Prompt; on dismissal drop stale one-tap state and prompt once more.
async fn google_flow(adapter: &dyn SocialIdentityProvider) -> Result<SocialCredential, SocialError> {
    let provider = adapter.provider();
    let first = adapter.prompt_login().await?;
    if first == ProviderStatus::NotAuthorized {
        return Err(SocialError::Cancelled(provider));
    }
    if let Some(credential) = connected(first) {
        return Ok(credential);
    }

    tracing::debug!(%provider, "prompt dismissed; retrying with cleared state");
    adapter.clear_stale_state().await?;
    match adapter.prompt_login().await? {
        ProviderStatus::NotAuthorized => Err(SocialError::Cancelled(provider)),
        status => connected(status).ok_or(SocialError::Dismissed(provider)),
    }
}

/// Reuse an existing connection, otherwise prompt.
async fn facebook_flow(adapter: &dyn SocialIdentityProvider) -> Result<SocialCredential, SocialError> {
    let provider = adapter.provider();
    if let Some(credential) = connected(adapter.get_status().await?) {
        return Ok(credential);
    }
    connected(adapter.prompt_login().await?).ok_or(SocialError::Cancelled(provider))
}
