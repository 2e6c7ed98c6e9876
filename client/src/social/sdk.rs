//! Vendor SDK constants and the mapping from their callback payloads to
//! [`ProviderStatus`].
//!
//! The browser adapters serialize whatever the SDK hands their callbacks to
//! JSON and decode it here, so the mapping is testable off the page.

#[cfg(test)]
#[path = "sdk_test.rs"]
mod tests;

use serde::Deserialize;

use super::provider::{Provider, ProviderStatus};
use crate::config::ClientConfig;

pub const GOOGLE_SCRIPT_ID: &str = "google-gsi-client";
pub const GOOGLE_SCRIPT_URL: &str = "https://accounts.google.com/gsi/client";
/// Cookie One Tap sets to suppress itself after a dismissal.
pub const GOOGLE_STATE_COOKIE: &str = "g_state";
/// Dismissal reason reported when the prompt closed because it succeeded.
pub const GOOGLE_CREDENTIAL_RETURNED: &str = "credential_returned";

pub const FACEBOOK_SCRIPT_ID: &str = "facebook-jssdk";
pub const FACEBOOK_SCRIPT_URL: &str = "https://connect.facebook.net/tr_TR/sdk.js";
pub const FACEBOOK_API_VERSION: &str = "v18.0";
pub const FACEBOOK_SCOPE: &str = "email,public_profile";

/// Providers that have an id configured, with that id.
#[must_use]
pub fn configured(config: &ClientConfig) -> Vec<(Provider, String)> {
    let ids = [(Provider::Google, &config.google_client_id), (Provider::Facebook, &config.facebook_app_id)];
    ids.into_iter()
        .filter_map(|(provider, id)| id.clone().map(|id| (provider, id)))
        .collect()
}

// =============================================================================
// GOOGLE
// =============================================================================

#[derive(Debug, Default, Deserialize)]
struct GoogleCredentialResponse {
    #[serde(default)]
    credential: Option<String>,
}

/// Decode the `initialize` callback payload. The GIS credential is an id
/// token; it is sent as both tokens.
#[must_use]
pub fn google_credential(json: &str) -> ProviderStatus {
    let response: GoogleCredentialResponse = serde_json::from_str(json).unwrap_or_default();
    match response.credential.filter(|c| !c.is_empty()) {
        Some(credential) => ProviderStatus::Connected { access_token: credential.clone(), id_token: Some(credential) },
        None => ProviderStatus::Dismissed,
    }
}

/// Outcome of a prompt notification, or `None` while the prompt is still
/// open or closed because a credential is on its way.
#[must_use]
pub fn google_moment(not_displayed: bool, skipped: bool, dismissed_reason: Option<&str>) -> Option<ProviderStatus> {
    if not_displayed || skipped {
        return Some(ProviderStatus::Dismissed);
    }
    match dismissed_reason {
        Some(GOOGLE_CREDENTIAL_RETURNED) | None => None,
        Some(_) => Some(ProviderStatus::Dismissed),
    }
}

/// Assignment that drops a cookie for the whole site.
#[must_use]
pub fn expired_cookie(name: &str) -> String {
    format!("{name}=; Path=/; Max-Age=0")
}

// =============================================================================
// FACEBOOK
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FacebookResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    auth_response: Option<FacebookAuth>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FacebookAuth {
    access_token: String,
}

/// Decode a `getLoginStatus` or `login` callback payload.
#[must_use]
pub fn facebook_status(json: &str) -> ProviderStatus {
    let response: FacebookResponse = serde_json::from_str(json).unwrap_or_default();
    match (response.status.as_str(), response.auth_response) {
        ("connected", Some(auth)) if !auth.access_token.is_empty() => {
            ProviderStatus::Connected { access_token: auth.access_token, id_token: None }
        }
        ("not_authorized", _) => ProviderStatus::NotAuthorized,
        _ => ProviderStatus::Unknown,
    }
}
