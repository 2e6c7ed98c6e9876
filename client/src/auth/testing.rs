//! Fixtures for tests that drive a full `AuthService`.

use std::sync::Arc;

use serde_json::{Value, json};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

use super::AuthService;
use crate::net::api::ApiClient;
use crate::net::testing::MockTransport;
use crate::state::session::SessionState;
use crate::state::storage::{MemoryCookieJar, MemoryStorage};
use crate::state::token_store::TokenStore;

pub(crate) struct Harness {
    pub service: Arc<AuthService>,
    pub transport: Arc<MockTransport>,
    pub jar: Arc<MemoryCookieJar>,
    pub mirror: Arc<MemoryStorage>,
}

pub(crate) fn harness() -> Harness {
    harness_with(MemoryCookieJar::new(), MemoryStorage::new())
}

pub(crate) fn harness_with(jar: MemoryCookieJar, mirror: MemoryStorage) -> Harness {
    let jar = Arc::new(jar);
    let mirror = Arc::new(mirror);
    let transport = MockTransport::new();
    let store = TokenStore::new(jar.clone(), false);
    let session = SessionState::new(store.clone(), mirror.clone());
    let api = ApiClient::new(transport.clone(), store);
    Harness { service: AuthService::new(api, session), transport, jar, mirror }
}

pub(crate) fn user_json(id: &str) -> Value {
    json!({
        "id": id,
        "email": format!("{id}@example.com"),
        "username": id,
        "name": "Test",
        "surname": "User",
        "isVerified": false,
        "stats": { "followersCount": 3 }
    })
}

pub(crate) fn session_json(access: &str, refresh: &str, expires_in: Duration) -> Value {
    let expires_at = (OffsetDateTime::now_utc() + expires_in).format(&Rfc3339).unwrap();
    json!({
        "user": user_json("u1"),
        "accessToken": access,
        "refreshToken": refresh,
        "expiresAt": expires_at,
        "tokenType": "Bearer"
    })
}
