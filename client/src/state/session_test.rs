use std::sync::atomic::AtomicUsize;

use super::*;
use crate::state::storage::{CookieBackend, MemoryCookieJar, MemoryStorage};
use crate::state::token_store::TokenKind;

struct Fixture {
    state: SessionState,
    jar: Arc<MemoryCookieJar>,
    mirror: Arc<MemoryStorage>,
}

fn fixture_with(jar: MemoryCookieJar, mirror: MemoryStorage) -> Fixture {
    let jar = Arc::new(jar);
    let mirror = Arc::new(mirror);
    let store = TokenStore::new(jar.clone(), false);
    let state = SessionState::new(store, mirror.clone());
    Fixture { state, jar, mirror }
}

fn fixture() -> Fixture {
    fixture_with(MemoryCookieJar::new(), MemoryStorage::new())
}

fn alice() -> UserSummary {
    UserSummary {
        id: "u1".to_owned(),
        email: "alice@example.com".to_owned(),
        username: "alice".to_owned(),
        name: "Alice".to_owned(),
        ..UserSummary::default()
    }
}

fn credential(expires_at: Option<OffsetDateTime>) -> Credential {
    Credential { access_token: "abc".to_owned(), refresh_token: "xyz".to_owned(), expires_at }
}

fn mirror_json(mirror: &MemoryStorage) -> serde_json::Value {
    let raw = mirror.get_item(MIRROR_KEY).expect("mirror written");
    serde_json::from_str(&raw).expect("mirror is json")
}

// =============================================================================
// transitions
// =============================================================================

#[test]
fn initial_session_is_signed_out() {
    let f = fixture();
    let s = f.state.snapshot();
    assert_eq!(s, Session::default());
    assert!(!f.state.is_authenticated());
}

#[test]
fn authenticated_transition_writes_cookies_and_session() {
    let f = fixture();
    let expires = OffsetDateTime::now_utc() + Duration::hours(2);
    f.state.transition_to_authenticated(alice(), &credential(Some(expires)));

    let s = f.state.snapshot();
    assert!(s.is_authenticated);
    assert_eq!(s.user, Some(alice()));
    assert_eq!(s.session_expires_at, Some(expires));
    assert!(s.last_login_at.is_some());
    assert!(!s.is_loading);
    assert_eq!(s.error, None);
    assert_eq!(f.state.token_store().get(TokenKind::Access).as_deref(), Some("abc"));
    assert_eq!(f.jar.snapshot().len(), 2);
}

#[test]
fn missing_expiry_defaults_to_a_day() {
    let f = fixture();
    let before = OffsetDateTime::now_utc();
    f.state.transition_to_authenticated(alice(), &credential(None));
    let expires = f.state.snapshot().session_expires_at.expect("expiry assigned");
    assert!(expires >= before + DEFAULT_SESSION_TTL);
    assert!(expires <= OffsetDateTime::now_utc() + DEFAULT_SESSION_TTL);
}

#[test]
fn unauthenticated_transition_clears_everything() {
    let f = fixture();
    f.state.transition_to_authenticated(alice(), &credential(None));
    f.state.transition_to_unauthenticated();

    assert_eq!(f.state.snapshot(), Session::default());
    assert!(!f.state.token_store().has_any());
    assert!(f.jar.snapshot().is_empty());
}

#[test]
fn unauthenticated_transition_is_idempotent() {
    let f = fixture();
    f.state.transition_to_unauthenticated();
    f.state.transition_to_unauthenticated();
    assert_eq!(f.state.snapshot(), Session::default());
}

#[test]
fn begin_and_fail_operation_track_loading_and_error() {
    let f = fixture();
    f.state.set_error("old");
    f.state.begin_operation();
    let s = f.state.snapshot();
    assert!(s.is_loading);
    assert_eq!(s.error, None);

    f.state.fail_operation("Invalid request");
    let s = f.state.snapshot();
    assert!(!s.is_loading);
    assert_eq!(s.error.as_deref(), Some("Invalid request"));

    f.state.clear_error();
    assert_eq!(f.state.snapshot().error, None);
}

#[test]
fn mark_verified_flips_the_flag() {
    let f = fixture();
    f.state.transition_to_authenticated(alice(), &credential(None));
    f.state.mark_verified();
    assert!(f.state.snapshot().user.is_some_and(|u| u.is_verified));
}

#[test]
fn mark_verified_without_user_only_stops_loading() {
    let f = fixture();
    f.state.set_loading(true);
    f.state.mark_verified();
    let s = f.state.snapshot();
    assert!(s.user.is_none());
    assert!(!s.is_loading);
}

#[test]
fn replace_user_swaps_the_whole_record() {
    let f = fixture();
    f.state.transition_to_authenticated(alice(), &credential(None));
    let renamed = UserSummary { name: "Alicia".to_owned(), ..alice() };
    f.state.replace_user(renamed.clone());
    assert_eq!(f.state.snapshot().user, Some(renamed));
}

#[test]
fn expiry_in_the_past_reads_as_expired() {
    let f = fixture();
    f.state.transition_to_authenticated(alice(), &credential(Some(OffsetDateTime::now_utc() - Duration::minutes(1))));
    assert!(f.state.is_expired());
}

// =============================================================================
// observers
// =============================================================================

#[test]
fn listeners_see_previous_and_next() {
    let f = fixture();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    f.state.subscribe(move |prev, next| {
        sink.lock().unwrap().push((prev.is_authenticated, next.is_authenticated));
    });

    f.state.transition_to_authenticated(alice(), &credential(None));
    f.state.transition_to_unauthenticated();

    assert_eq!(*seen.lock().unwrap(), vec![(false, true), (true, false)]);
}

#[test]
fn no_op_updates_do_not_notify() {
    let f = fixture();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    f.state.subscribe(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    f.state.transition_to_unauthenticated();
    f.state.clear_error();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn unsubscribed_listener_is_not_called() {
    let f = fixture();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let id = f.state.subscribe(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    f.state.unsubscribe(id);
    f.state.set_loading(true);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn listener_may_read_the_session() {
    let f = fixture();
    let observer = f.state.clone();
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    f.state.subscribe(move |_, _| {
        *sink.lock().unwrap() = Some(observer.is_authenticated());
    });
    f.state.transition_to_authenticated(alice(), &credential(None));
    assert_eq!(*seen.lock().unwrap(), Some(true));
}

// =============================================================================
// mirror
// =============================================================================

#[test]
fn mirror_persists_user_but_never_tokens() {
    let f = fixture();
    f.state.transition_to_authenticated(alice(), &credential(None));

    let doc = mirror_json(&f.mirror);
    assert_eq!(doc["version"], 1);
    assert_eq!(doc["state"]["isAuthenticated"], true);
    assert_eq!(doc["state"]["user"]["username"], "alice");
    assert!(doc["state"]["sessionExpiresAt"].is_string());
    let raw = f.mirror.get_item(MIRROR_KEY).unwrap();
    assert!(!raw.contains("abc"));
    assert!(!raw.contains("xyz"));
}

#[test]
fn loading_flag_does_not_rewrite_mirror() {
    let f = fixture();
    f.state.set_loading(true);
    assert_eq!(f.mirror.get_item(MIRROR_KEY), None);
}

#[test]
fn rehydrate_restores_session_when_cookie_present() {
    let f = fixture();
    f.state.transition_to_authenticated(alice(), &credential(None));
    let expires = f.state.snapshot().session_expires_at;

    let restored = fixture_with(
        MemoryCookieJar::from_snapshot(f.jar.snapshot()),
        MemoryStorage::from_snapshot(f.mirror.snapshot()),
    );
    restored.state.rehydrate();
    let s = restored.state.snapshot();
    assert!(s.is_authenticated);
    assert_eq!(s.user, Some(alice()));
    assert_eq!(s.session_expires_at, expires);
}

#[test]
fn rehydrate_without_cookie_resets_session() {
    let f = fixture();
    f.state.transition_to_authenticated(alice(), &credential(None));

    let restored = fixture_with(MemoryCookieJar::new(), MemoryStorage::from_snapshot(f.mirror.snapshot()));
    restored.state.rehydrate();
    assert_eq!(restored.state.snapshot(), Session::default());
    assert_eq!(mirror_json(&restored.mirror)["state"]["isAuthenticated"], false);
}

#[test]
fn rehydrate_ignores_unreadable_mirror() {
    let mirror = MemoryStorage::new();
    mirror.set_item(MIRROR_KEY, "{not json");
    let f = fixture_with(MemoryCookieJar::new(), mirror);
    f.state.rehydrate();
    assert_eq!(f.state.snapshot(), Session::default());
}

#[test]
fn rehydrate_v0_mirror_assigns_fresh_expiry() {
    let jar = MemoryCookieJar::new();
    jar.assign("auth-token=abc; Path=/");
    let mirror = MemoryStorage::new();
    mirror.set_item(
        MIRROR_KEY,
        r#"{"version":0,"state":{"user":{"id":"u1","username":"alice"},"isAuthenticated":true,"sessionExpiresAt":"2001-01-01T00:00:00Z"}}"#,
    );
    let f = fixture_with(jar, mirror);
    f.state.rehydrate();

    let s = f.state.snapshot();
    assert!(s.is_authenticated);
    assert!(s.session_expires_at.is_some_and(|at| at > OffsetDateTime::now_utc()));
}

#[test]
fn rehydrate_authenticated_without_user_resets() {
    let jar = MemoryCookieJar::new();
    jar.assign("auth-token=abc; Path=/");
    let mirror = MemoryStorage::new();
    mirror.set_item(MIRROR_KEY, r#"{"version":1,"state":{"isAuthenticated":true}}"#);
    let f = fixture_with(jar, mirror);
    f.state.rehydrate();

    assert!(!f.state.is_authenticated());
    assert!(!f.state.token_store().has_any());
}
