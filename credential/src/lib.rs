//! Shared auth contract between the browser client and the edge guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! The browser session and the edge route guard run in separate execution
//! contexts and share no memory. The only channel between them is the pair of
//! credential cookies, so their names, the claim layout inside the access
//! token, and the route classification table all live here and are imported by
//! both `client` and `server`.

pub mod claims;
pub mod endpoints;
pub mod routes;
pub mod user;

pub use claims::Claims;
pub use routes::{RouteClass, RouteTable};
pub use user::{AuthResponse, UserStats, UserSummary};

// =============================================================================
// COOKIES
// =============================================================================

/// Cookie carrying the access credential. Read by the edge guard.
pub const ACCESS_COOKIE: &str = "auth-token";

/// Cookie carrying the refresh credential.
pub const REFRESH_COOKIE: &str = "refresh-token";

/// Default access cookie lifetime in days.
pub const ACCESS_COOKIE_TTL_DAYS: i64 = 7;

/// Default refresh cookie lifetime in days.
pub const REFRESH_COOKIE_TTL_DAYS: i64 = 30;

// =============================================================================
// HEADERS
// =============================================================================

/// Non-authoritative client hint: `true` when the browser believes it holds a
/// credential. The guard never grants access on this header alone.
pub const CLIENT_AUTH_HEADER: &str = "x-client-auth";

/// Identity header derived from verified claims at the edge.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Role header derived from verified claims at the edge.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Token type announced by the backend for session-producing responses.
pub const BEARER: &str = "Bearer";

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
