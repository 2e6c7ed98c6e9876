//! Identity providers and the capability each SDK adapter exposes.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use credential::endpoints;

use super::SocialError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Provider {
    Google,
    Facebook,
}

impl Provider {
    pub const ALL: [Self; 2] = [Self::Google, Self::Facebook];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Google => "google",
            Self::Facebook => "facebook",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Google => "Google",
            Self::Facebook => "Facebook",
        }
    }

    /// Backend endpoint that exchanges this provider's token for a session.
    #[must_use]
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Google => endpoints::SOCIAL_GOOGLE,
            Self::Facebook => endpoints::SOCIAL_FACEBOOK,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = SocialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" => Ok(Self::Google),
            "facebook" => Ok(Self::Facebook),
            other => Err(SocialError::UnknownProvider(other.to_owned())),
        }
    }
}

/// What the SDK reports after a status check or a login prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Connected { access_token: String, id_token: Option<String> },
    /// The user closed the prompt, or the prompt could not be displayed.
    Dismissed,
    NotAuthorized,
    Unknown,
}

/// Adapter over one third-party identity SDK.
///
/// In the browser an implementation injects the vendor script and talks to
/// its globals; tests provide a scripted fake.
#[async_trait]
pub trait SocialIdentityProvider: Send + Sync {
    fn provider(&self) -> Provider;

    /// Add the SDK script to the page and resolve once it has loaded.
    async fn inject_script(&self) -> Result<(), SocialError>;

    /// Whether the SDK globals are present and callable.
    fn is_callable(&self) -> bool;

    /// Configure the SDK with the application's client id.
    async fn initialize(&self) -> Result<(), SocialError>;

    async fn get_status(&self) -> Result<ProviderStatus, SocialError>;

    async fn prompt_login(&self) -> Result<ProviderStatus, SocialError>;

    /// Drop any cached one-tap or session state left by a previous prompt.
    async fn clear_stale_state(&self) -> Result<(), SocialError>;

    fn remove_script(&self);
}
