//! Response hardening and identity headers for requests the guard lets through.

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use credential::{USER_ID_HEADER, USER_ROLE_HEADER};

use super::Identity;

const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "camera=(), microphone=(), geolocation=()"),
];

const HSTS: (&str, &str) = ("strict-transport-security", "max-age=31536000; includeSubDomains");

/// Drop identity headers a client tried to supply itself.
pub fn strip_identity(headers: &mut HeaderMap) {
    headers.remove(USER_ID_HEADER);
    headers.remove(USER_ROLE_HEADER);
}

pub fn apply_security(headers: &mut HeaderMap, production: bool) {
    for (name, value) in SECURITY_HEADERS {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    if production {
        headers.insert(HeaderName::from_static(HSTS.0), HeaderValue::from_static(HSTS.1));
    }
}

/// Stamp the verified identity. Values that are not valid header text are
/// skipped with a warning.
pub fn apply_identity(headers: &mut HeaderMap, identity: &Identity) {
    for (name, value) in [(USER_ID_HEADER, identity.user_id.as_str()), (USER_ROLE_HEADER, identity.role.as_str())] {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.insert(HeaderName::from_static(name), value);
            }
            Err(_) => tracing::warn!(header = name, "claim not representable as a header value"),
        }
    }
}
