//! Static route classification shared by the edge guard and client redirects.
//!
//! DESIGN
//! ======
//! A rule matches its exact path or any sub-path (`/feed` matches `/feed` and
//! `/feed/42`, not `/feedback`). A trailing `*` turns the rule into a raw
//! prefix match. When a path matches several classes the most restrictive
//! wins: admin, then auth-only, then protected, then public. Unlisted paths are
//! public.

/// Where unauthenticated visitors are sent.
pub const LOGIN_PATH: &str = "/login";

/// Where authenticated visitors land when they hit an auth-only page.
pub const LANDING_PATH: &str = "/feed";

/// Where authenticated but under-privileged visitors are sent.
pub const UNAUTHORIZED_PATH: &str = "/unauthorized";

/// Access class of a navigable path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteClass {
    Public,
    /// Login/register pages; authenticated visitors are bounced away.
    AuthOnly,
    Protected,
    Admin,
}

impl RouteClass {
    /// Whether this class needs a valid credential to be served.
    #[must_use]
    pub fn requires_credential(self) -> bool {
        matches!(self, Self::Protected | Self::Admin)
    }
}

/// Immutable partition of path rules into [`RouteClass`]es.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    public: Vec<String>,
    auth_only: Vec<String>,
    protected: Vec<String>,
    admin: Vec<String>,
}

impl RouteTable {
    /// The Camply route table.
    #[must_use]
    pub fn camply() -> Self {
        Self::default()
            .with(RouteClass::Protected, ["/feed", "/profile", "/settings", "/dashboard", "/admin"])
            .with(RouteClass::AuthOnly, ["/login", "/register", "/auth/login", "/auth/register"])
            .with(
                RouteClass::Public,
                [
                    "/",
                    "/about",
                    "/contact",
                    "/explore",
                    "/map",
                    "/camps",
                    "/forgot-password",
                    "/auth/forgot-password",
                    "/auth/reset-password",
                    "/auth/verify-email",
                ],
            )
            .with(RouteClass::Admin, ["/admin"])
    }

    /// Append rules to a class.
    #[must_use]
    pub fn with<I, S>(mut self, class: RouteClass, rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let bucket = match class {
            RouteClass::Public => &mut self.public,
            RouteClass::AuthOnly => &mut self.auth_only,
            RouteClass::Protected => &mut self.protected,
            RouteClass::Admin => &mut self.admin,
        };
        bucket.extend(rules.into_iter().map(Into::into));
        self
    }

    /// Classify a request path.
    #[must_use]
    pub fn classify(&self, path: &str) -> RouteClass {
        if matches_any(path, &self.admin) {
            RouteClass::Admin
        } else if matches_any(path, &self.auth_only) {
            RouteClass::AuthOnly
        } else if matches_any(path, &self.protected) {
            RouteClass::Protected
        } else {
            RouteClass::Public
        }
    }
}

fn matches_any(path: &str, rules: &[String]) -> bool {
    rules.iter().any(|rule| matches_rule(path, rule))
}

/// Whether `path` falls under `rule`.
#[must_use]
pub fn matches_rule(path: &str, rule: &str) -> bool {
    if let Some(prefix) = rule.strip_suffix('*') {
        return path.starts_with(prefix);
    }
    if rule == "/" {
        return path == "/";
    }
    path == rule || path.strip_prefix(rule).is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
