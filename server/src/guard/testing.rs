//! Token minting for guard tests.

use credential::Claims;
use jsonwebtoken::{EncodingKey, Header, encode};
use time::OffsetDateTime;

pub const SECRET: &str = "test-secret";

/// Claims for `sub` expiring `ttl_secs` from now (negative for the past).
pub fn claims(sub: &str, ttl_secs: i64, role: Option<&str>) -> Claims {
    let now = OffsetDateTime::now_utc().unix_timestamp();
    Claims {
        sub: sub.to_owned(),
        exp: now + ttl_secs,
        iat: Some(now),
        role: role.map(str::to_owned),
        email: Some(format!("{sub}@camply.test")),
    }
}

pub fn sign(claims: &Claims, secret: &str) -> String {
    encode(&Header::default(), claims, &EncodingKey::from_secret(secret.as_bytes())).expect("token should encode")
}

/// A signed, currently valid token.
pub fn valid_token(sub: &str, role: Option<&str>) -> String {
    sign(&claims(sub, 3600, role), SECRET)
}
