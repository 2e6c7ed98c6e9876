//! Storage media behind the token store and the session mirror.
//!
//! SYSTEM CONTEXT
//! ==============
//! In the browser the cookie medium is `document.cookie` and the mirror lives
//! in `localStorage`; both are reachable only under the `hydrate` feature.
//! Native callers (tests, the CLI) use the in-memory media, which honour the
//! same write semantics: a `Max-Age=0` assignment deletes the cookie.

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use cookie::Cookie;
use time::Duration;

/// Script-visible cookie jar with `document.cookie` semantics.
pub trait CookieBackend: Send + Sync {
    /// Current cookies as a `name=value; name2=value2` string.
    fn cookie_string(&self) -> String;

    /// Apply one `Set-Cookie`-style assignment (`name=value; Path=/; ...`).
    fn assign(&self, set_cookie: &str);
}

/// String key/value storage with `localStorage` semantics.
pub trait KeyValueStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// IN-MEMORY COOKIE JAR
// =============================================================================

/// Raw assignments a [`MemoryCookieJar`] remembers.
pub const ASSIGNMENT_LOG_LIMIT: usize = 32;

/// Cookie jar kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<BTreeMap<String, String>>,
    assignments: Mutex<VecDeque<String>>,
}

impl MemoryCookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore a jar from a previously taken [`snapshot`](Self::snapshot).
    #[must_use]
    pub fn from_snapshot(cookies: BTreeMap<String, String>) -> Self {
        Self { cookies: Mutex::new(cookies), assignments: Mutex::new(VecDeque::new()) }
    }

    /// Live cookies by name.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        lock(&self.cookies).clone()
    }

    /// The most recent raw assignments, oldest first, at most
    /// [`ASSIGNMENT_LOG_LIMIT`] of them.
    #[must_use]
    pub fn assignments(&self) -> Vec<String> {
        lock(&self.assignments).iter().cloned().collect()
    }
}

impl CookieBackend for MemoryCookieJar {
    fn cookie_string(&self) -> String {
        lock(&self.cookies)
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    fn assign(&self, set_cookie: &str) {
        {
            let mut log = lock(&self.assignments);
            if log.len() == ASSIGNMENT_LOG_LIMIT {
                log.pop_front();
            }
            log.push_back(set_cookie.to_owned());
        }

        let parsed = match Cookie::parse(set_cookie.to_owned()) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "ignoring malformed cookie assignment");
                return;
            }
        };

        let mut cookies = lock(&self.cookies);
        if parsed.max_age().is_some_and(|age| age <= Duration::ZERO) {
            cookies.remove(parsed.name());
        } else {
            cookies.insert(parsed.name().to_owned(), parsed.value().to_owned());
        }
    }
}

// =============================================================================
// IN-MEMORY KEY/VALUE STORAGE
// =============================================================================

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_snapshot(items: BTreeMap<String, String>) -> Self {
        Self { items: Mutex::new(items) }
    }

    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        lock(&self.items).clone()
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        lock(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        lock(&self.items).insert(key.to_owned(), value.to_owned());
    }

    fn remove_item(&self, key: &str) {
        lock(&self.items).remove(key);
    }
}

// =============================================================================
// BROWSER MEDIA
// =============================================================================

/// `document.cookie` of the current page.
#[cfg(feature = "hydrate")]
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentCookies;

#[cfg(feature = "hydrate")]
fn html_document() -> Option<web_sys::HtmlDocument> {
    use wasm_bindgen::JsCast;

    web_sys::window()?.document()?.dyn_into::<web_sys::HtmlDocument>().ok()
}

#[cfg(feature = "hydrate")]
impl CookieBackend for DocumentCookies {
    fn cookie_string(&self) -> String {
        html_document()
            .and_then(|doc| doc.cookie().ok())
            .unwrap_or_default()
    }

    fn assign(&self, set_cookie: &str) {
        if let Some(doc) = html_document() {
            let _ = doc.set_cookie(set_cookie);
        }
    }
}

/// `window.localStorage`.
#[cfg(feature = "hydrate")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

#[cfg(feature = "hydrate")]
fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

#[cfg(feature = "hydrate")]
impl KeyValueStorage for LocalStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        local_storage()?.get_item(key).ok().flatten()
    }

    fn set_item(&self, key: &str, value: &str) {
        if let Some(storage) = local_storage() {
            let _ = storage.set_item(key, value);
        }
    }

    fn remove_item(&self, key: &str) {
        if let Some(storage) = local_storage() {
            let _ = storage.remove_item(key);
        }
    }
}
