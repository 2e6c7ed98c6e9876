//! Access-token verification at the edge.

#[cfg(test)]
#[path = "token_test.rs"]
mod tests;

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum_extra::extract::cookie::CookieJar;
use credential::{ACCESS_COOKIE, BEARER, Claims};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

/// Where a presented credential was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Cookie,
    Header,
}

/// The raw credential presented with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Presented {
    pub token: String,
    pub source: Source,
}

/// Take the credential from the access cookie, else from a bearer header.
pub fn extract(headers: &HeaderMap) -> Option<Presented> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(ACCESS_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(Presented { token: cookie.value().to_owned(), source: Source::Cookie });
    }

    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case(BEARER) || token.is_empty() {
        return None;
    }
    Some(Presented { token: token.to_owned(), source: Source::Header })
}

/// HS256 verifier with zero clock leeway.
#[derive(Clone)]
pub struct Verifier {
    key: DecodingKey,
    validation: Validation,
}

impl Verifier {
    #[must_use]
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_aud = false;
        Self { key: DecodingKey::from_secret(secret.as_bytes()), validation }
    }

    /// Verify signature and expiry.
    ///
    /// # Errors
    ///
    /// Any signature, format, or expiry failure.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.key, &self.validation).map(|data| data.claims)
    }
}
