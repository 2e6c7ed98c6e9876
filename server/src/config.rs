//! Edge guard configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path::PathBuf;

/// Signing secret used outside production when `JWT_SECRET` is unset.
pub const DEV_SECRET: &str = "camply-development-secret";

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardConfig {
    pub secret: String,
    pub production: bool,
    /// Extra trusted origin for state-changing requests.
    pub app_url: Option<String>,
    pub port: u16,
    pub site_dir: PathBuf,
    pub cookie_secure: bool,
}

impl GuardConfig {
    /// Build typed guard config from environment variables.
    ///
    /// - `JWT_SECRET`: required when `APP_ENV=production`
    /// - `APP_ENV`, `APP_URL`, `PORT` (default 3000)
    /// - `SITE_DIR`: static root, default `../site` next to the manifest
    /// - `COOKIE_SECURE`: overrides the TLS guess for cookie deletion
    ///
    /// # Errors
    ///
    /// See [`from_lookup`](Self::from_lookup).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Missing`] for a production deployment without a
    /// secret, [`ConfigError::Invalid`] for an unparseable port or flag.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let production = var("APP_ENV").is_some_and(|env| env.eq_ignore_ascii_case("production"));

        let secret = match var("JWT_SECRET") {
            Some(secret) => secret,
            None if production => return Err(ConfigError::Missing("JWT_SECRET")),
            None => {
                tracing::warn!("JWT_SECRET not set; using the development secret");
                DEV_SECRET.to_owned()
            }
        };

        let port = match var("PORT") {
            None => DEFAULT_PORT,
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid { var: "PORT", value: raw })?,
        };

        let app_url = var("APP_URL").map(|url| url.trim_end_matches('/').to_owned());

        let cookie_secure = match var("COOKIE_SECURE") {
            None => production || app_url.as_deref().is_some_and(|url| url.starts_with("https://")),
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { var: "COOKIE_SECURE", value: raw })?,
        };

        let site_dir = var("SITE_DIR")
            .map_or_else(|| PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../site"), PathBuf::from);

        Ok(Self { secret, production, app_url, port, site_dir, cookie_secure })
    }
}

/// Accepts `1/true/yes/on` and `0/false/no/off`, case-insensitively.
pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
