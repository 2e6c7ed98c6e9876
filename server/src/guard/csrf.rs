//! Same-origin check for state-changing requests.
//!
//! The credential cookie is `SameSite=Lax`, which still lets top-level
//! cross-site navigations carry it. Unsafe methods must therefore prove they
//! were issued by this site through `Origin` or, failing that, `Referer`.

#[cfg(test)]
#[path = "csrf_test.rs"]
mod tests;

use axum::http::header::{HOST, ORIGIN, REFERER};
use axum::http::{HeaderMap, Method, Uri};

/// Methods that must pass the origin check.
#[must_use]
pub fn is_state_changing(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH | Method::DELETE)
}

/// Whether the request's `Origin` or `Referer` names this site.
///
/// The site's own authority is the `Host` header, or `request_authority`
/// (the request URI's authority, which HTTP/2 carries as `:authority`) when
/// there is no `Host`. `Origin` may match it or the configured app URL.
/// `Referer` is only compared against it.
#[must_use]
pub fn same_origin(headers: &HeaderMap, request_authority: Option<&str>, app_url: Option<&str>) -> bool {
    let host = header_str(headers, HOST.as_str()).or(request_authority);
    let app_authority = app_url.and_then(authority);

    if let Some(origin) = header_str(headers, ORIGIN.as_str()).and_then(authority) {
        let matches_host = host.is_some_and(|host| origin.eq_ignore_ascii_case(host));
        let matches_app = app_authority.as_deref().is_some_and(|app| origin.eq_ignore_ascii_case(app));
        if matches_host || matches_app {
            return true;
        }
    }

    match (header_str(headers, REFERER.as_str()).and_then(authority), host) {
        (Some(referer), Some(host)) => referer.eq_ignore_ascii_case(host),
        _ => false,
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

/// `host[:port]` of an absolute URL.
fn authority(url: &str) -> Option<String> {
    let uri: Uri = url.parse().ok()?;
    uri.scheme()?;
    uri.authority().map(|a| a.as_str().to_owned())
}
