//! Claims carried inside the signed access token.

use serde::{Deserialize, Serialize};

/// Role assumed when a token carries no `role` claim.
pub const DEFAULT_ROLE: &str = "user";

/// Role required by admin routes.
pub const ADMIN_ROLE: &str = "admin";

/// Access-token payload as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user id.
    pub sub: String,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Claims {
    /// The role claim, falling back to [`DEFAULT_ROLE`].
    #[must_use]
    pub fn role(&self) -> &str {
        self.role.as_deref().unwrap_or(DEFAULT_ROLE)
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role() == ADMIN_ROLE
    }
}
