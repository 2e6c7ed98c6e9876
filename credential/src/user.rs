//! User and session-response payloads exchanged with the backend.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::BEARER;

/// Counters shown on profile cards. Derived server-side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserStats {
    pub followers_count: u64,
    pub following_count: u64,
    pub posts_count: u64,
    pub camps_visited: u64,
    pub reviews_count: u64,
    pub likes_received: u64,
}

/// The signed-in user as the session knows it.
///
/// Older backend builds send `firstName`/`lastName`/`avatar`; those are
/// accepted as aliases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    pub email: String,
    pub username: String,
    #[serde(alias = "firstName")]
    pub name: String,
    #[serde(alias = "lastName")]
    pub surname: String,
    #[serde(alias = "avatar", skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    pub is_verified: bool,
    pub stats: UserStats,
}

/// Body of every session-producing call (login, register, social, refresh).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserSummary,
    #[serde(alias = "token")]
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute access expiry. Absent when the backend relies on defaults.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<OffsetDateTime>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    BEARER.to_owned()
}
