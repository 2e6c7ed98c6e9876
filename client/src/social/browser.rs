//! Browser adapters over Google Identity Services and the Facebook JS SDK.
//!
//! SYSTEM CONTEXT
//! ==============
//! Each adapter injects its vendor script, reports whether the SDK globals
//! (`window.google.accounts.id`, `window.FB`) are callable, and turns the
//! vendor callbacks into [`ProviderStatus`] values through oneshot channels.
//!
//! DESIGN
//! ======
//! JS values never cross an `.await`: every call into the page happens in a
//! synchronous helper that hands back a Rust receiver, which keeps the
//! adapters `Send` like the trait requires.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures::channel::oneshot;
use js_sys::{Array, Function, Object, Reflect};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};

use super::SocialError;
use super::provider::{Provider, ProviderStatus, SocialIdentityProvider};
use super::sdk;
use crate::state::storage::{CookieBackend, DocumentCookies};

const GOOGLE_ID: &[&str] = &["google", "accounts", "id"];
const FACEBOOK: &[&str] = &["FB"];

// =============================================================================
// PAGE HELPERS
// =============================================================================

/// `window.<path>`, or `None` when any link is missing.
fn global(path: &[&str]) -> Option<JsValue> {
    let mut value: JsValue = web_sys::window()?.into();
    for key in path {
        value = Reflect::get(&value, &JsValue::from_str(key)).ok()?;
        if value.is_undefined() || value.is_null() {
            return None;
        }
    }
    Some(value)
}

fn is_function(path: &[&str], name: &str) -> bool {
    global(path)
        .and_then(|target| Reflect::get(&target, &JsValue::from_str(name)).ok())
        .is_some_and(|f| f.is_function())
}

fn describe(error: &JsValue) -> String {
    error.as_string().unwrap_or_else(|| json(error))
}

fn json(value: &JsValue) -> String {
    js_sys::JSON::stringify(value).map(String::from).unwrap_or_default()
}

/// Call `window.<path>.<name>(...args)` with the object as `this`.
fn invoke(provider: Provider, path: &[&str], name: &str, args: &[JsValue]) -> Result<JsValue, SocialError> {
    let target = global(path).ok_or(SocialError::SdkUnavailable(provider))?;
    let function = Reflect::get(&target, &JsValue::from_str(name))
        .ok()
        .and_then(|f| f.dyn_into::<Function>().ok())
        .ok_or(SocialError::SdkUnavailable(provider))?;
    let args: Array = args.iter().collect();
    function
        .apply(&target, &args)
        .map_err(|e| SocialError::LoadFailed { provider, reason: describe(&e) })
}

/// Call a zero-argument method on `target`.
fn method(target: &JsValue, name: &str) -> Option<JsValue> {
    let function = Reflect::get(target, &JsValue::from_str(name)).ok()?.dyn_into::<Function>().ok()?;
    function.call0(target).ok()
}

fn options(provider: Provider, entries: &[(&str, JsValue)]) -> Result<JsValue, SocialError> {
    let object = Object::new();
    for (key, value) in entries {
        Reflect::set(&object, &JsValue::from_str(key), value)
            .map_err(|e| SocialError::LoadFailed { provider, reason: describe(&e) })?;
    }
    Ok(object.into())
}

type ScriptLoad = oneshot::Receiver<Result<(), String>>;

/// Append `<script id=.. src=.. async defer>` to the head. `None` when a
/// script with that id is already on the page.
fn append_script(provider: Provider, id: &str, src: &str) -> Result<Option<ScriptLoad>, SocialError> {
    let failed = |reason: String| SocialError::LoadFailed { provider, reason };
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| failed("no document".to_owned()))?;
    if document.get_element_by_id(id).is_some() {
        return Ok(None);
    }

    let script = document
        .create_element("script")
        .map_err(|e| failed(describe(&e)))?
        .dyn_into::<web_sys::HtmlScriptElement>()
        .map_err(|_| failed("not a script element".to_owned()))?;
    script.set_id(id);
    script.set_src(src);
    script.set_async(true);
    script.set_defer(true);

    let (tx, rx) = oneshot::channel();
    let tx = Rc::new(RefCell::new(Some(tx)));
    let on_load = {
        let tx = Rc::clone(&tx);
        Closure::once_into_js(move || {
            if let Some(tx) = tx.borrow_mut().take() {
                let _ = tx.send(Ok(()));
            }
        })
    };
    let source = src.to_owned();
    let on_error = Closure::once_into_js(move || {
        if let Some(tx) = tx.borrow_mut().take() {
            let _ = tx.send(Err(format!("could not load {source}")));
        }
    });
    script.set_onload(Some(on_load.unchecked_ref()));
    script.set_onerror(Some(on_error.unchecked_ref()));

    let head = document.head().ok_or_else(|| failed("no document head".to_owned()))?;
    head.append_child(&script).map_err(|e| failed(describe(&e)))?;
    Ok(Some(rx))
}

async fn script_loaded(provider: Provider, load: Option<ScriptLoad>) -> Result<(), SocialError> {
    let Some(load) = load else {
        return Ok(());
    };
    match load.await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(reason)) => Err(SocialError::LoadFailed { provider, reason }),
        Err(_) => Err(SocialError::LoadFailed { provider, reason: "script load abandoned".to_owned() }),
    }
}

fn remove_script(id: &str, globals: &[&str]) {
    let Some(window) = web_sys::window() else {
        return;
    };
    if let Some(script) = window.document().and_then(|d| d.get_element_by_id(id)) {
        script.remove();
    }
    for name in globals {
        let _ = Reflect::delete_property(&window, &JsValue::from_str(name));
    }
}

// =============================================================================
// GOOGLE
// =============================================================================

type Pending = Arc<Mutex<Option<oneshot::Sender<ProviderStatus>>>>;

fn settle(pending: &Pending, status: ProviderStatus) {
    let sender = pending.lock().unwrap_or_else(PoisonError::into_inner).take();
    if let Some(sender) = sender {
        let _ = sender.send(status);
    }
}

/// Google Identity Services one-tap sign-in.
pub struct GoogleIdentity {
    client_id: String,
    pending: Pending,
}

impl GoogleIdentity {
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self { client_id: client_id.into(), pending: Arc::new(Mutex::new(None)) }
    }

    fn initialize_sdk(&self) -> Result<(), SocialError> {
        let pending = Arc::clone(&self.pending);
        let callback = Closure::<dyn FnMut(JsValue)>::new(move |response: JsValue| {
            settle(&pending, sdk::google_credential(&json(&response)));
        })
        .into_js_value();
        let config = options(
            Provider::Google,
            &[
                ("client_id", JsValue::from_str(&self.client_id)),
                ("callback", callback),
                ("cancel_on_tap_outside", JsValue::TRUE),
            ],
        )?;
        invoke(Provider::Google, GOOGLE_ID, "initialize", &[config])?;
        Ok(())
    }

    fn start_prompt(&self) -> Result<oneshot::Receiver<ProviderStatus>, SocialError> {
        let (tx, rx) = oneshot::channel();
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner) = Some(tx);

        let pending = Arc::clone(&self.pending);
        let on_moment = Closure::<dyn FnMut(JsValue)>::new(move |notification: JsValue| {
            let flag = |name: &str| method(&notification, name).is_some_and(|v| v.is_truthy());
            let reason = method(&notification, "getDismissedReason").and_then(|v| v.as_string());
            if let Some(status) = sdk::google_moment(flag("isNotDisplayed"), flag("isSkippedMoment"), reason.as_deref())
            {
                settle(&pending, status);
            }
        })
        .into_js_value();
        invoke(Provider::Google, GOOGLE_ID, "prompt", &[on_moment])?;
        Ok(rx)
    }
}

#[async_trait]
impl SocialIdentityProvider for GoogleIdentity {
    fn provider(&self) -> Provider {
        Provider::Google
    }

    async fn inject_script(&self) -> Result<(), SocialError> {
        let load = append_script(Provider::Google, sdk::GOOGLE_SCRIPT_ID, sdk::GOOGLE_SCRIPT_URL)?;
        script_loaded(Provider::Google, load).await
    }

    fn is_callable(&self) -> bool {
        is_function(GOOGLE_ID, "initialize") && is_function(GOOGLE_ID, "prompt")
    }

    async fn initialize(&self) -> Result<(), SocialError> {
        self.initialize_sdk()
    }

    async fn get_status(&self) -> Result<ProviderStatus, SocialError> {
        Ok(ProviderStatus::Unknown)
    }

    async fn prompt_login(&self) -> Result<ProviderStatus, SocialError> {
        let outcome = self.start_prompt()?;
        Ok(outcome.await.unwrap_or(ProviderStatus::Dismissed))
    }

    async fn clear_stale_state(&self) -> Result<(), SocialError> {
        let _ = invoke(Provider::Google, GOOGLE_ID, "cancel", &[]);
        DocumentCookies.assign(&sdk::expired_cookie(sdk::GOOGLE_STATE_COOKIE));
        Ok(())
    }

    fn remove_script(&self) {
        settle(&self.pending, ProviderStatus::Dismissed);
        remove_script(sdk::GOOGLE_SCRIPT_ID, &["google"]);
    }
}

// =============================================================================
// FACEBOOK
// =============================================================================

/// Facebook Login through the JS SDK.
pub struct FacebookSdk {
    app_id: String,
}

impl FacebookSdk {
    #[must_use]
    pub fn new(app_id: impl Into<String>) -> Self {
        Self { app_id: app_id.into() }
    }

    fn initialize_sdk(&self) -> Result<(), SocialError> {
        let config = options(
            Provider::Facebook,
            &[
                ("appId", JsValue::from_str(&self.app_id)),
                ("cookie", JsValue::TRUE),
                ("xfbml", JsValue::FALSE),
                ("version", JsValue::from_str(sdk::FACEBOOK_API_VERSION)),
            ],
        )?;
        invoke(Provider::Facebook, FACEBOOK, "init", &[config])?;
        Ok(())
    }
}

/// `FB.<name>(callback[, { scope }])`, resolved through a channel.
fn facebook_request(name: &str, scope: Option<&str>) -> Result<oneshot::Receiver<ProviderStatus>, SocialError> {
    let (tx, rx) = oneshot::channel();
    let callback = Closure::once_into_js(move |response: JsValue| {
        let _ = tx.send(sdk::facebook_status(&json(&response)));
    });
    let mut args = vec![callback];
    if let Some(scope) = scope {
        args.push(options(Provider::Facebook, &[("scope", JsValue::from_str(scope))])?);
    }
    invoke(Provider::Facebook, FACEBOOK, name, &args)?;
    Ok(rx)
}

#[async_trait]
impl SocialIdentityProvider for FacebookSdk {
    fn provider(&self) -> Provider {
        Provider::Facebook
    }

    async fn inject_script(&self) -> Result<(), SocialError> {
        let load = append_script(Provider::Facebook, sdk::FACEBOOK_SCRIPT_ID, sdk::FACEBOOK_SCRIPT_URL)?;
        script_loaded(Provider::Facebook, load).await
    }

    fn is_callable(&self) -> bool {
        is_function(FACEBOOK, "init") && is_function(FACEBOOK, "login")
    }

    async fn initialize(&self) -> Result<(), SocialError> {
        self.initialize_sdk()
    }

    async fn get_status(&self) -> Result<ProviderStatus, SocialError> {
        let status = facebook_request("getLoginStatus", None)?;
        Ok(status.await.unwrap_or(ProviderStatus::Unknown))
    }

    async fn prompt_login(&self) -> Result<ProviderStatus, SocialError> {
        let status = facebook_request("login", Some(sdk::FACEBOOK_SCOPE))?;
        Ok(status.await.unwrap_or(ProviderStatus::Unknown))
    }

    async fn clear_stale_state(&self) -> Result<(), SocialError> {
        Ok(())
    }

    fn remove_script(&self) {
        remove_script(sdk::FACEBOOK_SCRIPT_ID, &["FB", "fbAsyncInit"]);
    }
}
