//! Credential persistence in the cookie medium.
//!
//! DESIGN
//! ======
//! The edge guard reads `auth-token` from the request cookies before any page
//! script runs, so cookies are the single source of truth for the credential.
//! Local storage is only ever read once, to migrate credentials written by
//! older builds, and is then emptied.

#[cfg(test)]
#[path = "token_store_test.rs"]
mod tests;

use std::sync::Arc;

use cookie::{Cookie, SameSite};
use credential::{ACCESS_COOKIE, ACCESS_COOKIE_TTL_DAYS, REFRESH_COOKIE, REFRESH_COOKIE_TTL_DAYS};
use time::Duration;

use super::storage::{CookieBackend, KeyValueStorage};

/// Which half of the credential pair to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    #[must_use]
    pub fn cookie_name(self) -> &'static str {
        match self {
            Self::Access => ACCESS_COOKIE,
            Self::Refresh => REFRESH_COOKIE,
        }
    }
}

/// Cookie lifetimes applied by [`TokenStore::set`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenTtl {
    pub access: Duration,
    pub refresh: Duration,
}

impl Default for TokenTtl {
    fn default() -> Self {
        Self { access: Duration::days(ACCESS_COOKIE_TTL_DAYS), refresh: Duration::days(REFRESH_COOKIE_TTL_DAYS) }
    }
}

/// Get/set/clear access to the persisted credential pair.
///
/// Clones share the same medium.
#[derive(Clone)]
pub struct TokenStore {
    medium: Arc<dyn CookieBackend>,
    secure: bool,
}

impl TokenStore {
    /// `secure` adds the `Secure` attribute; set it when the app is served over TLS.
    #[must_use]
    pub fn new(medium: Arc<dyn CookieBackend>, secure: bool) -> Self {
        Self { medium, secure }
    }

    /// Write both cookies, replacing any previous pair.
    pub fn set(&self, access_token: &str, refresh_token: &str, ttl: TokenTtl) {
        self.write(ACCESS_COOKIE, access_token, ttl.access);
        self.write(REFRESH_COOKIE, refresh_token, ttl.refresh);
    }

    /// Read one cookie. Empty values read as absent.
    #[must_use]
    pub fn get(&self, kind: TokenKind) -> Option<String> {
        let name = kind.cookie_name();
        let raw = self.medium.cookie_string();
        Cookie::split_parse(raw.as_str())
            .filter_map(Result::ok)
            .find(|c| c.name() == name)
            .map(|c| c.value().to_owned())
            .filter(|value| !value.is_empty())
    }

    /// Whether either half of the pair is present.
    #[must_use]
    pub fn has_any(&self) -> bool {
        self.get(TokenKind::Access).is_some() || self.get(TokenKind::Refresh).is_some()
    }

    /// Delete both cookies. Clearing an empty store is a no-op write.
    pub fn clear(&self) {
        self.write(ACCESS_COOKIE, "", Duration::ZERO);
        self.write(REFRESH_COOKIE, "", Duration::ZERO);
    }

    /// `Cookie` header value carrying the credential cookies, for transports
    /// that cannot rely on the browser to attach them.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        let pairs: Vec<String> = [TokenKind::Access, TokenKind::Refresh]
            .into_iter()
            .filter_map(|kind| self.get(kind).map(|value| format!("{}={value}", kind.cookie_name())))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }

    /// Move credentials left in local storage by older builds into cookies.
    ///
    /// Legacy keys are removed either way. Returns `true` when a credential was
    /// migrated.
    pub fn migrate_legacy(&self, legacy: &dyn KeyValueStorage) -> bool {
        let access = legacy.get_item(ACCESS_COOKIE).filter(|v| !v.is_empty());
        let refresh = legacy.get_item(REFRESH_COOKIE).filter(|v| !v.is_empty());
        legacy.remove_item(ACCESS_COOKIE);
        legacy.remove_item(REFRESH_COOKIE);

        if self.has_any() || (access.is_none() && refresh.is_none()) {
            return false;
        }

        let ttl = TokenTtl::default();
        if let Some(access) = access {
            self.write(ACCESS_COOKIE, &access, ttl.access);
        }
        if let Some(refresh) = refresh {
            self.write(REFRESH_COOKIE, &refresh, ttl.refresh);
        }
        tracing::info!("migrated legacy credential from local storage to cookies");
        true
    }

    fn write(&self, name: &'static str, value: &str, max_age: Duration) {
        let cookie = Cookie::build((name, value.to_owned()))
            .path("/")
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .max_age(max_age)
            .build();
        self.medium.assign(&cookie.to_string());
    }
}
