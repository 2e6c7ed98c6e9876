use std::sync::atomic::{AtomicUsize, Ordering};

use serde_json::json;

use super::*;
use crate::net::testing::{MockTransport, Reply};
use crate::net::transport::TransportError;
use crate::state::storage::MemoryCookieJar;
use crate::state::token_store::TokenTtl;

fn client() -> (ApiClient, Arc<MockTransport>) {
    let transport = MockTransport::new();
    let store = TokenStore::new(Arc::new(MemoryCookieJar::new()), false);
    (ApiClient::new(transport.clone(), store), transport)
}

// =============================================================================
// prepare
// =============================================================================

#[test]
fn signed_out_request_has_no_bearer_and_false_hint() {
    let (api, _) = client();
    let req = api.prepare(Method::GET, "/users/me", None, RequestOptions::default());
    assert_eq!(req.header("authorization"), None);
    assert_eq!(req.header("x-client-auth"), Some("false"));
    assert_eq!(req.cookies, None);
    assert_eq!(req.timeout, DEFAULT_TIMEOUT);
}

#[test]
fn signed_in_request_carries_bearer_hint_and_cookies() {
    let (api, _) = client();
    api.token_store().set("abc", "xyz", TokenTtl::default());
    let req = api.prepare(Method::GET, "/users/me", None, RequestOptions::default());
    assert_eq!(req.header("Authorization"), Some("Bearer abc"));
    assert_eq!(req.header("X-Client-Auth"), Some("true"));
    assert_eq!(req.cookies.as_deref(), Some("auth-token=abc; refresh-token=xyz"));
}

#[test]
fn anonymous_request_skips_bearer_but_keeps_hint() {
    let (api, _) = client();
    api.token_store().set("abc", "xyz", TokenTtl::default());
    let req = api.prepare(Method::POST, "/auth/login", None, RequestOptions::anonymous());
    assert_eq!(req.header("authorization"), None);
    assert_eq!(req.header("x-client-auth"), Some("true"));
}

#[test]
fn store_is_read_at_call_time() {
    let (api, _) = client();
    let before = api.prepare(Method::GET, "/x", None, RequestOptions::default());
    api.token_store().set("fresh", "r", TokenTtl::default());
    let after = api.prepare(Method::GET, "/x", None, RequestOptions::default());
    assert_eq!(before.header("authorization"), None);
    assert_eq!(after.header("authorization"), Some("Bearer fresh"));
}

#[test]
fn per_call_timeout_overrides_default() {
    let (api, _) = client();
    let api = api.with_timeout(Duration::from_secs(3));
    let options = RequestOptions { skip_auth: false, timeout: Some(Duration::from_secs(1)) };
    assert_eq!(api.prepare(Method::GET, "/x", None, options).timeout, Duration::from_secs(1));
    assert_eq!(api.prepare(Method::GET, "/x", None, RequestOptions::default()).timeout, Duration::from_secs(3));
}

// =============================================================================
// dispatch
// =============================================================================

#[tokio::test]
async fn success_body_is_decoded_flat_or_enveloped() {
    let (api, transport) = client();
    transport.on("/a", Reply::Json(200, json!({ "value": 1 })));
    transport.on("/b", Reply::Json(200, json!({ "data": { "value": 2 } })));

    let a: Value = api.post("/a", &json!({}), RequestOptions::default()).await.unwrap();
    let b: serde_json::Map<String, Value> = api.post("/b", &json!({}), RequestOptions::default()).await.unwrap();
    assert_eq!(a["value"], 1);
    assert_eq!(b["value"], 2);
}

#[tokio::test]
async fn body_is_serialized_into_request() {
    let (api, transport) = client();
    transport.on("/auth/login", Reply::Status(204));
    api.post_unit("/auth/login", &json!({ "email": "a@b.c" }), RequestOptions::anonymous())
        .await
        .unwrap();
    let sent = transport.requests_to("/auth/login");
    assert_eq!(sent[0].method, Method::POST);
    assert_eq!(sent[0].body, Some(json!({ "email": "a@b.c" })));
}

#[tokio::test]
async fn error_status_is_classified() {
    let (api, transport) = client();
    transport.on("/x", Reply::Json(400, json!({ "message": "Bad email" })));
    let err = api.post_unit("/x", &json!({}), RequestOptions::default()).await.unwrap_err();
    assert_eq!(err.status(), 400);
    assert_eq!(err.user_message(), "Bad email");
}

#[tokio::test]
async fn transport_failure_is_network_error() {
    let (api, transport) = client();
    transport.on("/x", Reply::Fail(TransportError::Connect("refused".into())));
    let err = api.post_unit("/x", &json!({}), RequestOptions::default()).await.unwrap_err();
    assert!(matches!(err, ApiError::Network(_)));
    assert_eq!(err.status(), 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_call_times_out() {
    let (api, transport) = client();
    transport.on("/x", Reply::Hang);
    let err = api.post_unit("/x", &json!({}), RequestOptions::default()).await.unwrap_err();
    assert_eq!(err, ApiError::Timeout(DEFAULT_TIMEOUT));
}

#[test]
fn dispatch_outside_tokio_completes() {
    let (api, transport) = client();
    transport.on("/auth/forgot-password", Reply::Status(204));
    let outcome = futures::executor::block_on(api.post_unit(
        "/auth/forgot-password",
        &json!({ "email": "a@b.c" }),
        RequestOptions::anonymous(),
    ));
    assert_eq!(outcome, Ok(()));
    assert_eq!(transport.requests_to("/auth/forgot-password").len(), 1);
}

#[tokio::test]
async fn mismatched_body_is_decode_error() {
    let (api, transport) = client();
    transport.on("/x", Reply::Json(200, json!("text")));
    let err = api
        .post::<_, credential::AuthResponse>("/x", &json!({}), RequestOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Decode(_)));
}

// =============================================================================
// unauthorized hook
// =============================================================================

fn counting_hook(api: &ApiClient) -> Arc<AtomicUsize> {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    api.set_unauthorized_handler(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    calls
}

#[tokio::test]
async fn unauthorized_with_current_bearer_fires_hook() {
    let (api, transport) = client();
    let calls = counting_hook(&api);
    api.token_store().set("abc", "xyz", TokenTtl::default());
    transport.on("/users/me", Reply::Status(401));

    let err = api.put::<_, Value>("/users/me", &json!({}), RequestOptions::default()).await.unwrap_err();
    assert!(matches!(err, ApiError::Authentication { .. }));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unauthorized_anonymous_call_does_not_fire_hook() {
    let (api, transport) = client();
    let calls = counting_hook(&api);
    api.token_store().set("abc", "xyz", TokenTtl::default());
    transport.on("/auth/login", Reply::Status(401));

    let _ = api.post_unit("/auth/login", &json!({}), RequestOptions::anonymous()).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unauthorized_for_replaced_credential_does_not_fire_hook() {
    let (api, transport) = client();
    let calls = counting_hook(&api);
    api.token_store().set("old", "r", TokenTtl::default());
    transport.on("/x", Reply::Status(401));

    let request = api.prepare(Method::GET, "/x", None, RequestOptions::default());
    api.token_store().set("new", "r2", TokenTtl::default());
    let _ = api.dispatch(request).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}
