use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use super::*;

struct FakeSdk {
    provider: Provider,
    injects: AtomicUsize,
    clears: AtomicUsize,
    removed: AtomicBool,
    callable: AtomicBool,
    fail_inject: AtomicBool,
    becomes_callable: bool,
    status: Mutex<ProviderStatus>,
    prompts: Mutex<VecDeque<ProviderStatus>>,
    prompt_delay: Option<Duration>,
}

impl FakeSdk {
    fn new(provider: Provider) -> Self {
        Self {
            provider,
            injects: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            removed: AtomicBool::new(false),
            callable: AtomicBool::new(false),
            fail_inject: AtomicBool::new(false),
            becomes_callable: true,
            status: Mutex::new(ProviderStatus::Unknown),
            prompts: Mutex::new(VecDeque::new()),
            prompt_delay: None,
        }
    }

    fn prompts(self, replies: impl IntoIterator<Item = ProviderStatus>) -> Self {
        self.prompts.lock().unwrap().extend(replies);
        self
    }

    fn bridge(self) -> (SocialBridge, Arc<Self>) {
        let sdk = Arc::new(self);
        (SocialBridge::new().with_adapter(sdk.clone()), sdk)
    }
}

#[async_trait]
impl SocialIdentityProvider for FakeSdk {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn inject_script(&self) -> Result<(), SocialError> {
        self.injects.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        if self.fail_inject.load(Ordering::SeqCst) {
            return Err(SocialError::LoadFailed { provider: self.provider, reason: "script error".into() });
        }
        if self.becomes_callable {
            self.callable.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn is_callable(&self) -> bool {
        self.callable.load(Ordering::SeqCst)
    }

    async fn initialize(&self) -> Result<(), SocialError> {
        Ok(())
    }

    async fn get_status(&self) -> Result<ProviderStatus, SocialError> {
        Ok(self.status.lock().unwrap().clone())
    }

    async fn prompt_login(&self) -> Result<ProviderStatus, SocialError> {
        if let Some(delay) = self.prompt_delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.prompts.lock().unwrap().pop_front().unwrap_or(ProviderStatus::Dismissed))
    }

    async fn clear_stale_state(&self) -> Result<(), SocialError> {
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove_script(&self) {
        self.removed.store(true, Ordering::SeqCst);
    }
}

fn google_token(token: &str) -> ProviderStatus {
    ProviderStatus::Connected { access_token: token.to_owned(), id_token: Some(format!("id-{token}")) }
}

// =============================================================================
// load lifecycle
// =============================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_loads_inject_once() {
    let (bridge, sdk) = FakeSdk::new(Provider::Google).bridge();
    let (a, b) = tokio::join!(bridge.load(Provider::Google), bridge.load(Provider::Google));
    assert_eq!(a, Ok(()));
    assert_eq!(b, Ok(()));
    assert_eq!(sdk.injects.load(Ordering::SeqCst), 1);
    assert_eq!(bridge.state(Provider::Google), LoadState::Ready);
}

#[tokio::test(start_paused = true)]
async fn ready_sdk_is_not_reinjected() {
    let (bridge, sdk) = FakeSdk::new(Provider::Google).bridge();
    bridge.load(Provider::Google).await.unwrap();
    bridge.load(Provider::Google).await.unwrap();
    assert_eq!(sdk.injects.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn sdk_that_never_becomes_callable_is_unavailable() {
    let sdk = FakeSdk { becomes_callable: false, ..FakeSdk::new(Provider::Facebook) };
    let (bridge, _) = sdk.bridge();
    let err = bridge.load(Provider::Facebook).await.unwrap_err();
    assert_eq!(err, SocialError::SdkUnavailable(Provider::Facebook));
    assert_eq!(bridge.state(Provider::Facebook), LoadState::Failed(err));
}

#[tokio::test(start_paused = true)]
async fn failed_load_stays_failed_until_reload() {
    let (bridge, sdk) = FakeSdk::new(Provider::Google).bridge();
    sdk.fail_inject.store(true, Ordering::SeqCst);
    assert!(bridge.load(Provider::Google).await.is_err());
    assert!(bridge.load(Provider::Google).await.is_err());
    assert_eq!(sdk.injects.load(Ordering::SeqCst), 1);

    sdk.fail_inject.store(false, Ordering::SeqCst);
    assert_eq!(bridge.reload(Provider::Google).await, Ok(()));
    assert_eq!(sdk.injects.load(Ordering::SeqCst), 2);
    assert_eq!(bridge.state(Provider::Google), LoadState::Ready);
}

#[tokio::test(start_paused = true)]
async fn unload_resets_state_and_removes_script() {
    let (bridge, sdk) = FakeSdk::new(Provider::Google).bridge();
    bridge.load(Provider::Google).await.unwrap();
    bridge.unload(Provider::Google);
    assert_eq!(bridge.state(Provider::Google), LoadState::Unloaded);
    assert!(sdk.removed.load(Ordering::SeqCst));

    bridge.load(Provider::Google).await.unwrap();
    assert_eq!(sdk.injects.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_adapter_is_not_configured() {
    let bridge = SocialBridge::new();
    assert!(!bridge.is_configured(Provider::Google));
    assert_eq!(bridge.load(Provider::Google).await, Err(SocialError::NotConfigured(Provider::Google)));
}

// =============================================================================
// google
// =============================================================================

#[tokio::test(start_paused = true)]
async fn google_returns_credential_on_first_prompt() {
    let (bridge, sdk) = FakeSdk::new(Provider::Google).prompts([google_token("g1")]).bridge();
    let credential = bridge.invoke_login(Provider::Google).await.unwrap();
    assert_eq!(credential, SocialCredential { credential: "g1".into(), id_token: Some("id-g1".into()) });
    assert_eq!(sdk.clears.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn google_retries_once_after_dismissal() {
    let (bridge, sdk) = FakeSdk::new(Provider::Google)
        .prompts([ProviderStatus::Dismissed, google_token("g2")])
        .bridge();
    let credential = bridge.invoke_login(Provider::Google).await.unwrap();
    assert_eq!(credential.credential, "g2");
    assert_eq!(sdk.clears.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn google_second_dismissal_fails() {
    let (bridge, _) = FakeSdk::new(Provider::Google)
        .prompts([ProviderStatus::Dismissed, ProviderStatus::Dismissed])
        .bridge();
    assert_eq!(bridge.invoke_login(Provider::Google).await, Err(SocialError::Dismissed(Provider::Google)));
}

#[tokio::test(start_paused = true)]
async fn slow_prompt_times_out() {
    let sdk = FakeSdk { prompt_delay: Some(Duration::from_secs(60)), ..FakeSdk::new(Provider::Google) };
    let (bridge, _) = sdk.bridge();
    assert_eq!(bridge.invoke_login(Provider::Google).await, Err(SocialError::Timeout(Provider::Google)));
}

// =============================================================================
// facebook
// =============================================================================

#[tokio::test(start_paused = true)]
async fn facebook_reuses_connected_status() {
    let sdk = FakeSdk::new(Provider::Facebook);
    *sdk.status.lock().unwrap() = ProviderStatus::Connected { access_token: "fb".into(), id_token: None };
    let (bridge, _) = sdk.bridge();
    let credential = bridge.invoke_login(Provider::Facebook).await.unwrap();
    assert_eq!(credential, SocialCredential { credential: "fb".into(), id_token: None });
}

#[tokio::test(start_paused = true)]
async fn facebook_prompts_when_not_connected() {
    let (bridge, _) = FakeSdk::new(Provider::Facebook)
        .prompts([ProviderStatus::Connected { access_token: "fb2".into(), id_token: None }])
        .bridge();
    assert_eq!(bridge.invoke_login(Provider::Facebook).await.unwrap().credential, "fb2");
}

#[tokio::test(start_paused = true)]
async fn facebook_refusal_is_cancelled() {
    let (bridge, _) = FakeSdk::new(Provider::Facebook).prompts([ProviderStatus::NotAuthorized]).bridge();
    assert_eq!(bridge.invoke_login(Provider::Facebook).await, Err(SocialError::Cancelled(Provider::Facebook)));
}

// =============================================================================
// provider
// =============================================================================

#[test]
fn provider_parses_case_insensitively() {
    assert_eq!("Google".parse::<Provider>(), Ok(Provider::Google));
    assert_eq!(" facebook ".parse::<Provider>(), Ok(Provider::Facebook));
    assert!(matches!("github".parse::<Provider>(), Err(SocialError::UnknownProvider(_))));
}

#[test]
fn provider_endpoints() {
    assert_eq!(Provider::Google.endpoint(), "/auth/social/google");
    assert_eq!(Provider::Facebook.endpoint(), "/auth/social/facebook");
}
