//! Edge route guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Runs as axum middleware in front of every navigation and API call the
//! edge serves. It never sees the browser's session state; its only input is
//! the incoming request, so the access cookie (or a bearer header) is the sole
//! source of truth.
//!
//! DECISION ORDER
//! ==============
//! 1. static assets and `/api/auth/` bypass the guard
//! 2. unsafe methods must pass the same-origin check (hard 403)
//! 3. the credential is verified; a bad cookie is deleted via redirect
//! 4. auth-only, admin and protected classes redirect as needed
//! 5. everything else is allowed and stamped with hardening headers
//!
//! The decision itself is the pure [`Guard::decide`]; the middleware only
//! turns it into a response.

pub mod csrf;
pub mod headers;
pub mod token;

#[cfg(test)]
pub(crate) mod testing;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::uri::Authority;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use credential::routes::{LANDING_PATH, LOGIN_PATH, UNAUTHORIZED_PATH};
use credential::{ACCESS_COOKIE, CLIENT_AUTH_HEADER, Claims, REFRESH_COOKIE, RouteClass, RouteTable};
use time::Duration;

use crate::config::GuardConfig;
use token::{Source, Verifier};

const BYPASS_PREFIXES: [&str; 4] = ["/pkg/", "/static/", "/assets/", "/api/auth/"];

const ASSET_EXTENSIONS: [&str; 14] =
    ["ico", "png", "jpg", "jpeg", "gif", "svg", "css", "js", "wasm", "woff", "woff2", "ttf", "eot", "map"];

pub const INVALID_ORIGIN: &str = "Forbidden - Invalid origin";

pub const MESSAGE_SESSION_EXPIRED: &str = "session-expired";
pub const MESSAGE_ADMIN_REQUIRED: &str = "admin-required";

/// Verified caller identity, inserted into request extensions for handlers
/// behind the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: String,
    pub email: Option<String>,
}

impl Identity {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == credential::claims::ADMIN_ROLE
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        let role = claims.role().to_owned();
        Self { user_id: claims.sub, role, email: claims.email }
    }
}

/// Outcome of evaluating one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Not subject to the guard at all.
    Bypass,
    /// Cross-origin state change.
    Forbidden,
    /// 307 to `location`; `clear_cookies` deletes both credential cookies.
    Redirect { location: String, clear_cookies: bool },
    Allow(Option<Identity>),
}

impl Decision {
    fn redirect(location: impl Into<String>) -> Self {
        Self::Redirect { location: location.into(), clear_cookies: false }
    }
}

/// Stateless per-request gate. Shared across requests behind an `Arc`.
pub struct Guard {
    routes: RouteTable,
    verifier: Verifier,
    app_url: Option<String>,
    production: bool,
    cookie_secure: bool,
}

impl Guard {
    #[must_use]
    pub fn new(config: &GuardConfig, routes: RouteTable) -> Self {
        Self {
            routes,
            verifier: Verifier::new(&config.secret),
            app_url: config.app_url.clone(),
            production: config.production,
            cookie_secure: config.cookie_secure,
        }
    }

    /// Evaluate a request without touching it.
    #[must_use]
    pub fn decide(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Decision {
        let path = uri.path();
        if is_bypassed(path) {
            return Decision::Bypass;
        }

        let request_authority = uri.authority().map(Authority::as_str);
        if csrf::is_state_changing(method) && !csrf::same_origin(headers, request_authority, self.app_url.as_deref()) {
            tracing::warn!(%method, %path, "rejected cross-origin request");
            return Decision::Forbidden;
        }

        let class = self.routes.classify(path);

        let identity = match token::extract(headers) {
            None => None,
            Some(presented) => match self.verifier.verify(&presented.token) {
                Ok(claims) => Some(Identity::from(claims)),
                Err(e) => {
                    tracing::debug!(error = %e, %path, source = ?presented.source, "credential rejected");
                    if presented.source == Source::Cookie {
                        let location = if class.requires_credential() {
                            login_redirect(path, None)
                        } else {
                            uri.path_and_query().map_or(path, |pq| pq.as_str()).to_owned()
                        };
                        return Decision::Redirect { location, clear_cookies: true };
                    }
                    None
                }
            },
        };

        match class {
            RouteClass::AuthOnly if identity.is_some() => Decision::redirect(LANDING_PATH),
            RouteClass::Admin => match identity {
                Some(identity) if identity.is_admin() => Decision::Allow(Some(identity)),
                Some(identity) => {
                    tracing::info!(user_id = %identity.user_id, %path, "admin route denied");
                    Decision::redirect(UNAUTHORIZED_PATH)
                }
                None => Decision::redirect(login_redirect(path, Some(MESSAGE_ADMIN_REQUIRED))),
            },
            RouteClass::Protected if identity.is_none() => {
                let hint = client_claims_session(headers).then_some(MESSAGE_SESSION_EXPIRED);
                Decision::redirect(login_redirect(path, hint))
            }
            _ => Decision::Allow(identity),
        }
    }

    fn clear_cookies(&self) -> CookieJar {
        [ACCESS_COOKIE, REFRESH_COOKIE].into_iter().fold(CookieJar::new(), |jar, name| {
            jar.add(
                Cookie::build((name, ""))
                    .path("/")
                    .same_site(SameSite::Lax)
                    .secure(self.cookie_secure)
                    .max_age(Duration::ZERO),
            )
        })
    }
}

/// Axum middleware entry point; mount with `middleware::from_fn_with_state`.
pub async fn guard(State(guard): State<Arc<Guard>>, mut request: Request, next: Next) -> Response {
    headers::strip_identity(request.headers_mut());

    match guard.decide(request.method(), request.uri(), request.headers()) {
        Decision::Bypass => next.run(request).await,
        Decision::Forbidden => (StatusCode::FORBIDDEN, INVALID_ORIGIN).into_response(),
        Decision::Redirect { location, clear_cookies: false } => Redirect::temporary(&location).into_response(),
        Decision::Redirect { location, clear_cookies: true } => {
            (guard.clear_cookies(), Redirect::temporary(&location)).into_response()
        }
        Decision::Allow(identity) => {
            if let Some(identity) = &identity {
                headers::apply_identity(request.headers_mut(), identity);
                request.extensions_mut().insert(identity.clone());
            }

            let mut response = next.run(request).await;
            headers::apply_security(response.headers_mut(), guard.production);
            if let Some(identity) = &identity {
                headers::apply_identity(response.headers_mut(), identity);
            }
            response
        }
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn is_bypassed(path: &str) -> bool {
    if BYPASS_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return true;
    }
    let last = path.rsplit('/').next().unwrap_or_default();
    last.rsplit_once('.').is_some_and(|(stem, ext)| {
        let ext = ext.to_ascii_lowercase();
        !stem.is_empty() && ASSET_EXTENSIONS.contains(&ext.as_str())
    })
}

/// `/login?redirect=<path>[&message=<hint>]`.
fn login_redirect(path: &str, message: Option<&str>) -> String {
    let mut location = format!("{LOGIN_PATH}?redirect={}", urlencoding::encode(path));
    if let Some(message) = message {
        location.push_str("&message=");
        location.push_str(message);
    }
    location
}

/// The client's belief that it holds a credential. Only ever a hint.
fn client_claims_session(headers: &HeaderMap) -> bool {
    headers
        .get(CLIENT_AUTH_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim().eq_ignore_ascii_case("true"))
}
