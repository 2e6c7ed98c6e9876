//! Request bodies sent by the auth operations.

use serde::Serialize;

use crate::social::Provider;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Sign-up form. `confirm_password` is checked locally and never sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterFields {
    pub email: String,
    pub username: String,
    #[serde(rename = "firstName")]
    pub name: String,
    #[serde(rename = "lastName")]
    pub surname: String,
    pub password: String,
    #[serde(skip)]
    pub confirm_password: Option<String>,
}

impl RegisterFields {
    pub(crate) fn passwords_match(&self) -> bool {
        self.confirm_password.as_ref().is_none_or(|confirm| *confirm == self.password)
    }
}

/// Partial profile update. Only `Some` fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SocialLoginBody<'a> {
    pub provider: &'static str,
    pub access_token: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<&'a str>,
}

impl<'a> SocialLoginBody<'a> {
    /// Google always sends both fields, empty when absent; Facebook omits a
    /// missing `idToken`.
    pub(crate) fn new(provider: Provider, access_token: Option<&'a str>, id_token: Option<&'a str>) -> Self {
        match provider {
            Provider::Google => Self {
                provider: provider.as_str(),
                access_token: access_token.unwrap_or_default(),
                id_token: Some(id_token.unwrap_or_default()),
            },
            Provider::Facebook => Self {
                provider: provider.as_str(),
                access_token: access_token.unwrap_or_default(),
                id_token,
            },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RefreshBody<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ChangePasswordBody<'a> {
    pub current_password: &'a str,
    pub new_password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct EmailBody<'a> {
    pub email: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResetPasswordBody<'a> {
    pub token: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenBody<'a> {
    pub token: &'a str,
}
