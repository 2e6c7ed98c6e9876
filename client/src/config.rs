//! Client configuration parsed from environment variables.

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::time::Duration;

pub const DEFAULT_API_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_SOCIAL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub app_url: Option<String>,
    pub google_client_id: Option<String>,
    pub facebook_app_id: Option<String>,
    pub api_timeout: Duration,
    pub social_timeout: Duration,
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Required:
    /// - `CAMPLY_API_BASE_URL`
    ///
    /// Optional:
    /// - `CAMPLY_APP_URL`: public origin of the web app
    /// - `CAMPLY_GOOGLE_CLIENT_ID`, `CAMPLY_FACEBOOK_APP_ID`
    /// - `CAMPLY_API_TIMEOUT_SECS`: default 15
    /// - `CAMPLY_SOCIAL_TIMEOUT_SECS`: default 30
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
    /// [`ConfigError::Missing`] without an API base URL, and
    /// [`ConfigError::Invalid`] for a non-numeric or zero timeout.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty());

        let api_base_url = var("CAMPLY_API_BASE_URL")
            .ok_or(ConfigError::Missing("CAMPLY_API_BASE_URL"))?
            .trim_end_matches('/')
            .to_owned();

        Ok(Self {
            api_base_url,
            app_url: var("CAMPLY_APP_URL").map(|url| url.trim_end_matches('/').to_owned()),
            google_client_id: var("CAMPLY_GOOGLE_CLIENT_ID"),
            facebook_app_id: var("CAMPLY_FACEBOOK_APP_ID"),
            api_timeout: parse_secs("CAMPLY_API_TIMEOUT_SECS", var("CAMPLY_API_TIMEOUT_SECS"), DEFAULT_API_TIMEOUT_SECS)?,
            social_timeout: parse_secs(
                "CAMPLY_SOCIAL_TIMEOUT_SECS",
                var("CAMPLY_SOCIAL_TIMEOUT_SECS"),
                DEFAULT_SOCIAL_TIMEOUT_SECS,
            )?,
        })
    }

    /// Whether credential cookies should carry `Secure`.
    #[must_use]
    pub fn secure_cookies(&self) -> bool {
        self.app_url.as_deref().unwrap_or(&self.api_base_url).starts_with("https://")
    }

    /// Check the social sign-in settings without touching any SDK.
    #[must_use]
    pub fn validate_social_config(&self) -> SocialConfigReport {
        let mut report = SocialConfigReport::default();

        match self.google_client_id.as_deref() {
            None => report.warnings.push("CAMPLY_GOOGLE_CLIENT_ID is not set; Google sign-in is disabled".to_owned()),
            Some(id) if !id.ends_with(".apps.googleusercontent.com") => {
                report.errors.push("CAMPLY_GOOGLE_CLIENT_ID is not a Google OAuth client id".to_owned());
            }
            Some(_) => {}
        }

        if let Some(id) = self.facebook_app_id.as_deref() {
            if !id.bytes().all(|b| b.is_ascii_digit()) {
                report.errors.push("CAMPLY_FACEBOOK_APP_ID must be numeric".to_owned());
            }
        }

        report
    }
}

/// Outcome of [`ClientConfig::validate_social_config`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SocialConfigReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl SocialConfigReport {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

fn parse_secs(var: &'static str, raw: Option<String>, default: u64) -> Result<Duration, ConfigError> {
    let Some(raw) = raw else {
        return Ok(Duration::from_secs(default));
    };
    match raw.parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(ConfigError::Invalid { var, value: raw }),
    }
}
