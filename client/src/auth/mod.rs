//! Auth operations.
//!
//! SYSTEM CONTEXT
//! ==============
//! [`AuthService`] is the only writer of session transitions triggered by the
//! user: every operation performs exactly one backend call and ends in either
//! a session transition or a recorded error. It also owns the refresh
//! scheduler and is the refresher that scheduler calls back into.
//!
//! DESIGN
//! ======
//! - User-triggered operations share a busy flag; a second submission while
//!   one is in flight fails with [`AuthError::Busy`] without touching state.
//! - Failures are stored on the session as a display message and returned as
//!   a typed [`AuthError`].
//! - Refresh is single-flight. Callers that queued behind a successful
//!   rotation reuse its result instead of spending the rotated token again.
//!
//! TRADE-OFFS
//! ==========
//! Logout never waits for the backend. Local state is cleared immediately and
//! the invalidation call runs on a background task bounded by the API timeout.

pub mod refresh;
pub mod requests;

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

#[cfg(test)]
pub(crate) mod testing;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use credential::{AuthResponse, UserSummary, endpoints};
use reqwest::Method;
use serde_json::json;

use self::refresh::{RefreshScheduler, SessionRefresher};
use self::requests::{
    ChangePasswordBody, EmailBody, LoginBody, ProfileUpdate, RefreshBody, RegisterFields, ResetPasswordBody,
    SocialLoginBody, TokenBody,
};
use crate::net::api::{ApiClient, RequestOptions};
use crate::net::error::ApiError;
use crate::runtime::{self, Task};
use crate::social::{Provider, SocialBridge, SocialError};
use crate::state::session::{Credential, SessionState};
use crate::state::storage::KeyValueStorage;
use crate::state::token_store::TokenKind;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Social(#[from] SocialError),
    #[error("no refresh token is stored")]
    MissingRefreshToken,
    #[error("not signed in")]
    NotAuthenticated,
    #[error("passwords do not match")]
    PasswordMismatch,
    #[error("another auth operation is in progress")]
    Busy,
}

impl AuthError {
    /// Message suitable for `Session.error`.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api(e) => e.user_message(),
            Self::Social(e) => e.user_message(),
            Self::MissingRefreshToken => "Your session has expired, please sign in again".to_owned(),
            Self::NotAuthenticated => "Please sign in to continue".to_owned(),
            Self::PasswordMismatch => "Passwords do not match".to_owned(),
            Self::Busy => "Please wait for the current request to finish".to_owned(),
        }
    }
}

// =============================================================================
// SERVICE
// =============================================================================

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct AuthService {
    api: ApiClient,
    session: SessionState,
    scheduler: RefreshScheduler,
    busy: AtomicBool,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl AuthService {
    /// Wire the service to `session`: arms the refresh scheduler and makes a
    /// rejected credential sign the session out.
    #[must_use]
    pub fn new(api: ApiClient, session: SessionState) -> Arc<Self> {
        let service = Arc::new_cyclic(|weak: &Weak<Self>| {
            let refresher: Weak<dyn SessionRefresher> = weak.clone();
            Self {
                api,
                session,
                scheduler: RefreshScheduler::new(refresher),
                busy: AtomicBool::new(false),
                refresh_gate: tokio::sync::Mutex::new(()),
            }
        });

        service.scheduler.attach(&service.session);
        let session = service.session.clone();
        service.api.set_unauthorized_handler(move || session.transition_to_unauthenticated());
        service
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    #[must_use]
    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    /// Restore the session at start-up.
    ///
    /// Migrates a legacy credential out of `legacy` storage, rehydrates the
    /// mirror, and refreshes straight away when the restored session has lost
    /// its access cookie or expired but still holds a refresh token.
    ///
    /// # Errors
    ///
    /// The refresh failure, after the session has been signed out.
    pub async fn bootstrap(&self, legacy: Option<&dyn KeyValueStorage>) -> Result<(), AuthError> {
        let store = self.session.token_store();
        if let Some(legacy) = legacy {
            store.migrate_legacy(legacy);
        }
        self.session.rehydrate();

        let needs_refresh = self.session.is_authenticated()
            && store.get(TokenKind::Refresh).is_some()
            && (store.get(TokenKind::Access).is_none() || self.session.is_expired());
        if needs_refresh {
            tracing::info!("restored session needs a fresh credential");
            self.refresh_token().await?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // credential-acquiring operations
    // -------------------------------------------------------------------------

    /// # Errors
    ///
    /// [`AuthError::Busy`] or the backend failure.
    pub async fn login(&self, email: &str, password: &str) -> Result<UserSummary, AuthError> {
        self.tracked("login", async {
            let response: AuthResponse = self
                .api
                .post(endpoints::LOGIN, &LoginBody { email, password }, RequestOptions::anonymous())
                .await?;
            self.establish(response)
        })
        .await
    }

    /// # Errors
    ///
    /// [`AuthError::PasswordMismatch`] without a network call, [`AuthError::Busy`],
    /// or the backend failure.
    pub async fn register(&self, fields: &RegisterFields) -> Result<UserSummary, AuthError> {
        self.tracked("register", async {
            if !fields.passwords_match() {
                return Err(AuthError::PasswordMismatch);
            }
            let response: AuthResponse =
                self.api.post(endpoints::REGISTER, fields, RequestOptions::anonymous()).await?;
            self.establish(response)
        })
        .await
    }

    /// Exchange a provider token for a session.
    ///
    /// # Errors
    ///
    /// [`AuthError::Busy`] or the backend failure.
    pub async fn social_login(
        &self,
        provider: Provider,
        access_token: Option<&str>,
        id_token: Option<&str>,
    ) -> Result<UserSummary, AuthError> {
        self.tracked("social_login", self.exchange_social(provider, access_token, id_token)).await
    }

    /// Run the provider's sign-in through `bridge`, then [`social_login`](Self::social_login).
    ///
    /// # Errors
    ///
    /// The bridge failure as [`AuthError::Social`], or as for `social_login`.
    pub async fn sign_in_with(&self, bridge: &SocialBridge, provider: Provider) -> Result<UserSummary, AuthError> {
        self.tracked("social_login", async {
            let credential = bridge.invoke_login(provider).await?;
            self.exchange_social(provider, Some(&credential.credential), credential.id_token.as_deref())
                .await
        })
        .await
    }

    async fn exchange_social(
        &self,
        provider: Provider,
        access_token: Option<&str>,
        id_token: Option<&str>,
    ) -> Result<UserSummary, AuthError> {
        let body = SocialLoginBody::new(provider, access_token, id_token);
        let response: AuthResponse = self.api.post(provider.endpoint(), &body, RequestOptions::anonymous()).await?;
        self.establish(response)
    }

    /// Exchange the stored refresh token for a new credential pair.
    ///
    /// Follows the loading protocol of the other operations but skips the busy
    /// flag, so a background refresh never rejects a user's submission. Any
    /// failure signs the session out and records the message.
    ///
    /// # Errors
    ///
    /// [`AuthError::MissingRefreshToken`] without a network call, or the
    /// backend failure.
    pub async fn refresh_token(&self) -> Result<UserSummary, AuthError> {
        let Some(sent) = self.session.token_store().get(TokenKind::Refresh) else {
            tracing::info!("refresh requested without a refresh token; signing out");
            self.logout();
            return Err(AuthError::MissingRefreshToken);
        };

        let _gate = self.refresh_gate.lock().await;

        let current = self.session.token_store().get(TokenKind::Refresh);
        if current.as_deref() != Some(sent.as_str()) {
            // Rotated (or cleared) by whoever held the gate before us.
            let snapshot = self.session.snapshot();
            return match (current, snapshot.user) {
                (Some(_), Some(user)) if snapshot.is_authenticated => Ok(user),
                _ => Err(AuthError::MissingRefreshToken),
            };
        }

        self.session.begin_operation();
        let response = self
            .api
            .post::<_, AuthResponse>(endpoints::REFRESH, &RefreshBody { refresh_token: &sent }, RequestOptions::anonymous())
            .await;
        if self.session.token_store().get(TokenKind::Refresh).as_deref() != Some(sent.as_str()) {
            // Signed out or signed in again while the call was in flight.
            tracing::debug!("session changed during refresh; discarding result");
            self.session.set_loading(false);
            return Err(AuthError::MissingRefreshToken);
        }
        let outcome = match response {
            Ok(response) => self.establish(response),
            Err(e) => Err(e.into()),
        };

        match outcome {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "credential refreshed");
                Ok(user)
            }
            Err(e) => {
                tracing::warn!(error = %e, "refresh failed; signing out");
                self.logout();
                self.session.fail_operation(e.user_message());
                Err(e)
            }
        }
    }

    // -------------------------------------------------------------------------
    // session termination
    // -------------------------------------------------------------------------

    /// Sign out locally and ask the backend to invalidate the credential.
    ///
    /// Local state is cleared before this returns. The backend call runs on a
    /// background task whose handle is returned; it is `None` when there was
    /// no credential to invalidate or no runtime to run the call on.
    pub fn logout(&self) -> Option<Task> {
        let request = self
            .session
            .token_store()
            .has_any()
            .then(|| self.api.prepare(Method::POST, endpoints::LOGOUT, Some(json!({})), RequestOptions::default()));

        let handle = request.and_then(|request| {
            let api = self.api.clone();
            runtime::spawn(async move {
                match api.dispatch(request).await {
                    Ok(_) => tracing::debug!("backend session invalidated"),
                    Err(e) => tracing::debug!(error = %e, "backend logout failed; local state already cleared"),
                }
            })
        });

        self.scheduler.disarm();
        self.session.transition_to_unauthenticated();
        tracing::info!("signed out");
        handle
    }

    // -------------------------------------------------------------------------
    // account operations
    // -------------------------------------------------------------------------

    /// Send a partial profile update and adopt the server's copy of the user.
    ///
    /// # Errors
    ///
    /// [`AuthError::NotAuthenticated`] without a network call, [`AuthError::Busy`],
    /// or the backend failure.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserSummary, AuthError> {
        if self.session.snapshot().user.is_none() {
            let err = AuthError::NotAuthenticated;
            self.session.fail_operation(err.user_message());
            return Err(err);
        }
        self.tracked("update_profile", async {
            let user: UserSummary = self.api.put(endpoints::UPDATE_PROFILE, update, RequestOptions::default()).await?;
            self.session.replace_user(user.clone());
            Ok(user)
        })
        .await
    }

    /// # Errors
    ///
    /// [`AuthError::Busy`] or the backend failure.
    pub async fn change_password(&self, current_password: &str, new_password: &str) -> Result<(), AuthError> {
        self.tracked("change_password", async {
            let body = ChangePasswordBody { current_password, new_password };
            self.api.post_unit(endpoints::CHANGE_PASSWORD, &body, RequestOptions::default()).await?;
            self.session.set_loading(false);
            Ok(())
        })
        .await
    }

    /// # Errors
    ///
    /// [`AuthError::Busy`] or the backend failure.
    pub async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        self.tracked("forgot_password", async {
            self.api
                .post_unit(endpoints::FORGOT_PASSWORD, &EmailBody { email }, RequestOptions::anonymous())
                .await?;
            self.session.set_loading(false);
            Ok(())
        })
        .await
    }

    /// # Errors
    ///
    /// [`AuthError::Busy`] or the backend failure.
    pub async fn reset_password(&self, token: &str, password: &str) -> Result<(), AuthError> {
        self.tracked("reset_password", async {
            self.api
                .post_unit(endpoints::RESET_PASSWORD, &ResetPasswordBody { token, password }, RequestOptions::anonymous())
                .await?;
            self.session.set_loading(false);
            Ok(())
        })
        .await
    }

    /// # Errors
    ///
    /// [`AuthError::Busy`] or the backend failure.
    pub async fn verify_email(&self, token: &str) -> Result<(), AuthError> {
        self.tracked("verify_email", async {
            self.api.post_unit(endpoints::VERIFY_EMAIL, &TokenBody { token }, RequestOptions::default()).await?;
            self.session.mark_verified();
            Ok(())
        })
        .await
    }

    // -------------------------------------------------------------------------
    // helpers
    // -------------------------------------------------------------------------

    fn establish(&self, response: AuthResponse) -> Result<UserSummary, AuthError> {
        if response.access_token.is_empty() || response.refresh_token.is_empty() {
            return Err(ApiError::Decode("session response without a credential".to_owned()).into());
        }
        let credential = Credential {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_at,
        };
        self.session.transition_to_authenticated(response.user.clone(), &credential);
        tracing::info!(user_id = %response.user.id, "session established");
        Ok(response.user)
    }

    async fn tracked<T, F>(&self, operation: &'static str, work: F) -> Result<T, AuthError>
    where
        F: Future<Output = Result<T, AuthError>>,
    {
        if self.busy.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed).is_err() {
            tracing::debug!(operation, "rejected duplicate submission");
            return Err(AuthError::Busy);
        }
        let _busy = BusyGuard(&self.busy);

        self.session.begin_operation();
        let outcome = work.await;
        if let Err(e) = &outcome {
            tracing::warn!(operation, error = %e, "auth operation failed");
            self.session.fail_operation(e.user_message());
        }
        outcome
    }
}

#[async_trait]
impl SessionRefresher for AuthService {
    async fn refresh(&self) -> Result<(), AuthError> {
        self.refresh_token().await.map(|_| ())
    }
}
