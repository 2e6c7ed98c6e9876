//! Observable session record with a persisted mirror.
//!
//! SYSTEM CONTEXT
//! ==============
//! `SessionState` is the UI-facing answer to "who is signed in". Auth
//! operations drive its transitions; the refresh scheduler and any view layer
//! observe it through [`SessionState::subscribe`].
//!
//! DESIGN
//! ======
//! The authenticated transition writes the token store before the new state
//! is committed, and the unauthenticated transition clears it, so the session
//! flag and the access cookie never disagree. The mirror persists only the
//! fields needed to paint a signed-in UI on reload, never the tokens; on
//! rehydration it is discarded unless a credential cookie is still present.

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use credential::UserSummary;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use super::storage::KeyValueStorage;
use super::token_store::{TokenStore, TokenTtl};

/// Storage key of the persisted mirror.
pub const MIRROR_KEY: &str = "auth-storage";

const MIRROR_VERSION: u32 = 1;

/// Session lifetime assumed when the backend omits `expiresAt`.
pub const DEFAULT_SESSION_TTL: Duration = Duration::hours(24);

// =============================================================================
// SESSION
// =============================================================================

/// Snapshot of the current session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    pub user: Option<UserSummary>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    pub error: Option<String>,
    pub last_login_at: Option<OffsetDateTime>,
    pub session_expires_at: Option<OffsetDateTime>,
}

impl Session {
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.session_expires_at.is_some_and(|expires| now > expires)
    }
}

/// A freshly issued credential pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: Option<OffsetDateTime>,
}

/// Handle returned by [`SessionState::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&Session, &Session) + Send + Sync>;

// =============================================================================
// MIRROR
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct MirrorDocument {
    #[serde(default)]
    version: u32,
    #[serde(default)]
    state: MirrorState,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct MirrorState {
    user: Option<UserSummary>,
    is_authenticated: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    last_login_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339::option")]
    session_expires_at: Option<OffsetDateTime>,
}

impl MirrorState {
    fn project(session: &Session) -> Self {
        Self {
            user: session.user.clone(),
            is_authenticated: session.is_authenticated,
            last_login_at: session.last_login_at,
            session_expires_at: session.session_expires_at,
        }
    }
}

fn decode_mirror(raw: &str) -> Option<MirrorState> {
    let doc: MirrorDocument = match serde_json::from_str(raw) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(error = %e, "discarding unreadable session mirror");
            return None;
        }
    };
    let mut state = doc.state;
    if doc.version == 0 {
        // v0 mirrors stored expiry in a format that is no longer trusted.
        state.session_expires_at = None;
    }
    Some(state)
}

// =============================================================================
// SESSION STATE
// =============================================================================

/// Process-wide session container. Clones share state.
#[derive(Clone)]
pub struct SessionState {
    inner: Arc<Inner>,
}

struct Inner {
    session: Mutex<Session>,
    listeners: Mutex<Vec<(SubscriptionId, Listener)>>,
    next_listener: AtomicU64,
    store: TokenStore,
    mirror: Arc<dyn KeyValueStorage>,
    ttl: TokenTtl,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SessionState {
    /// Create an empty session. Call [`rehydrate`](Self::rehydrate) at bootstrap.
    #[must_use]
    pub fn new(store: TokenStore, mirror: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_ttl(store, mirror, TokenTtl::default())
    }

    #[must_use]
    pub fn with_ttl(store: TokenStore, mirror: Arc<dyn KeyValueStorage>, ttl: TokenTtl) -> Self {
        Self {
            inner: Arc::new(Inner {
                session: Mutex::new(Session::default()),
                listeners: Mutex::new(Vec::new()),
                next_listener: AtomicU64::new(1),
                store,
                mirror,
                ttl,
            }),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Session {
        lock(&self.inner.session).clone()
    }

    #[must_use]
    pub fn token_store(&self) -> &TokenStore {
        &self.inner.store
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        lock(&self.inner.session).is_authenticated
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        lock(&self.inner.session).is_expired_at(OffsetDateTime::now_utc())
    }

    // -------------------------------------------------------------------------
    // observers
    // -------------------------------------------------------------------------

    /// Register a listener called with `(previous, next)` after every change.
    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&Session, &Session) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_listener.fetch_add(1, Ordering::Relaxed));
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        lock(&self.inner.listeners).retain(|(existing, _)| *existing != id);
    }

    // -------------------------------------------------------------------------
    // transitions
    // -------------------------------------------------------------------------

    /// Persist the credential, then mark the session signed in as `user`.
    pub fn transition_to_authenticated(&self, user: UserSummary, credential: &Credential) {
        self.inner
            .store
            .set(&credential.access_token, &credential.refresh_token, self.inner.ttl);

        let now = OffsetDateTime::now_utc();
        let expires_at = credential.expires_at.unwrap_or(now + DEFAULT_SESSION_TTL);
        self.update(|s| {
            *s = Session {
                user: Some(user),
                is_authenticated: true,
                is_loading: false,
                error: None,
                last_login_at: Some(now),
                session_expires_at: Some(expires_at),
            };
        });
    }

    /// Clear the credential and reset to the initial session. Idempotent.
    pub fn transition_to_unauthenticated(&self) {
        self.inner.store.clear();
        self.update(|s| *s = Session::default());
    }

    pub fn set_loading(&self, loading: bool) {
        self.update(|s| s.is_loading = loading);
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| s.error = Some(message));
    }

    pub fn clear_error(&self) {
        self.update(|s| s.error = None);
    }

    /// `isLoading = true` and a cleared error, as one change.
    pub fn begin_operation(&self) {
        self.update(|s| {
            s.is_loading = true;
            s.error = None;
        });
    }

    /// Record a failed operation's message and stop loading, as one change.
    pub fn fail_operation(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|s| {
            s.error = Some(message);
            s.is_loading = false;
        });
    }

    /// Replace the user wholesale with the server's canonical copy.
    pub fn replace_user(&self, user: UserSummary) {
        self.update(|s| {
            s.user = Some(user);
            s.is_loading = false;
        });
    }

    /// Flip `isVerified` on the current user, if any.
    pub fn mark_verified(&self) {
        self.update(|s| {
            if let Some(user) = s.user.as_mut() {
                user.is_verified = true;
            }
            s.is_loading = false;
        });
    }

    // -------------------------------------------------------------------------
    // mirror
    // -------------------------------------------------------------------------

    /// Restore the session from the mirror.
    ///
    /// A mirror claiming a signed-in user is only trusted while a credential
    /// cookie exists; otherwise the session is reset and the store cleared.
    pub fn rehydrate(&self) {
        let Some(state) = self.inner.mirror.get_item(MIRROR_KEY).and_then(|raw| decode_mirror(&raw)) else {
            return;
        };

        if !state.is_authenticated {
            return;
        }

        let Some(user) = state.user else {
            tracing::warn!("session mirror claims authentication without a user; resetting");
            self.discard_stale_mirror();
            return;
        };

        if !self.inner.store.has_any() {
            tracing::info!("session mirror outlived its credential; resetting");
            self.discard_stale_mirror();
            return;
        }

        let expires_at = state
            .session_expires_at
            .unwrap_or_else(|| OffsetDateTime::now_utc() + DEFAULT_SESSION_TTL);
        self.update(|s| {
            *s = Session {
                user: Some(user),
                is_authenticated: true,
                is_loading: false,
                error: None,
                last_login_at: state.last_login_at,
                session_expires_at: Some(expires_at),
            };
        });
    }

    fn discard_stale_mirror(&self) {
        self.inner.store.clear();
        self.persist(&Session::default());
        self.update(|s| *s = Session::default());
    }

    fn persist(&self, session: &Session) {
        let doc = MirrorDocument { version: MIRROR_VERSION, state: MirrorState::project(session) };
        match serde_json::to_string(&doc) {
            Ok(raw) => self.inner.mirror.set_item(MIRROR_KEY, &raw),
            Err(e) => tracing::warn!(error = %e, "failed to encode session mirror"),
        }
    }

    fn update(&self, mutate: impl FnOnce(&mut Session)) {
        let (previous, next) = {
            let mut session = lock(&self.inner.session);
            let previous = session.clone();
            mutate(&mut session);
            (previous, session.clone())
        };

        if previous == next {
            return;
        }
        if MirrorState::project(&previous) != MirrorState::project(&next) {
            self.persist(&next);
        }

        let listeners: Vec<Listener> = lock(&self.inner.listeners)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();
        for listener in listeners {
            listener(&previous, &next);
        }
    }
}
