//! Session store: current user, bearer token and their lifecycle.

use std::sync::Arc;

use reqwest::StatusCode;
use tokio::sync::RwLock;

use crate::api::ApiClient;
use crate::auth::{decode_claims, Claims};
use crate::errors::{ApiFailure, StoreError};
use crate::models::{
    Credentials, LoginResponse, ProfileEnvelope, ProfileUpdate, RegisterRequest, Role, User,
};
use crate::storage::TokenStorage;
use crate::stores::StoreStatus;

/// Result of a sign-in attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Success,
    /// Credentials were right but the account is pending or deactivated
    Inactive,
    Error,
}

/// Flags derived from the session; all the router guard reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionFlags {
    pub is_authenticated: bool,
    pub is_admin: bool,
    pub is_client: bool,
    pub is_sandbox_mode: bool,
}

impl SessionFlags {
    pub fn role(&self) -> Option<Role> {
        match (self.is_authenticated, self.is_admin, self.is_client) {
            (true, true, _) => Some(Role::Admin),
            (true, _, true) => Some(Role::Client),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
struct Identity {
    user: Option<User>,
    token: Option<String>,
}

/// The signed-in user and their credential.
pub struct Session {
    api: ApiClient,
    storage: Arc<dyn TokenStorage>,
    sandbox: bool,
    identity: RwLock<Identity>,
    status: StoreStatus,
}

impl Session {
    pub fn new(api: ApiClient, storage: Arc<dyn TokenStorage>, sandbox: bool) -> Self {
        Self {
            api,
            storage,
            sandbox,
            identity: RwLock::new(Identity::default()),
            status: StoreStatus::default(),
        }
    }

    pub async fn user(&self) -> Option<User> {
        self.identity.read().await.user.clone()
    }

    pub async fn token(&self) -> Option<String> {
        self.identity.read().await.token.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.identity.read().await.user.is_some()
    }

    pub async fn is_admin(&self) -> bool {
        self.flags().await.is_admin
    }

    pub async fn is_loading(&self) -> bool {
        self.status.is_loading().await
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.status.last_error().await
    }

    pub async fn flags(&self) -> SessionFlags {
        let identity = self.identity.read().await;
        let role = identity.user.as_ref().map(|u| u.role);
        SessionFlags {
            is_authenticated: identity.user.is_some(),
            is_admin: role == Some(Role::Admin),
            is_client: role == Some(Role::Client),
            is_sandbox_mode: self.sandbox,
        }
    }

    /// Pick up a token persisted by an earlier run.
    ///
    /// Any unreadable or expired token leaves the session anonymous and is
    /// removed from storage.
    pub async fn restore_session(&self) {
        let token = match self.storage.load() {
            Ok(Some(token)) => token,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("Could not read persisted token: {}", e);
                return;
            }
        };

        let claims = match decode_claims(&token) {
            Ok(claims) if !claims.is_expired() => claims,
            Ok(_) => {
                tracing::info!("Persisted token has expired");
                self.logout().await;
                return;
            }
            Err(e) => {
                tracing::warn!("Discarding persisted token: {}", e);
                self.logout().await;
                return;
            }
        };

        tracing::info!("Restoring session for {}", claims.username);
        self.establish(token, &claims).await;
        self.get_profile().await;
    }

    /// Sign in; failures are reported through the outcome and `last_error`.
    pub async fn login(&self, username: &str, password: &str) -> LoginOutcome {
        self.status.begin().await;

        let credentials = Credentials { username, password };
        let result = self
            .api
            .post::<_, LoginResponse>("/login", None, &credentials)
            .await;

        let (outcome, error) = match result {
            Ok(response) => match decode_claims(&response.token) {
                Ok(claims) if !claims.is_expired() => {
                    if let Err(e) = self.storage.save(&response.token) {
                        tracing::warn!("Could not persist token: {}", e);
                    }
                    self.establish(response.token, &claims).await;
                    (LoginOutcome::Success, None)
                }
                Ok(_) | Err(_) => {
                    tracing::error!("Login for {} returned an unusable token", username);
                    (
                        LoginOutcome::Error,
                        Some(StoreError::Server(
                            "The server returned an invalid session.".to_string(),
                        )),
                    )
                }
            },
            Err(failure) => {
                tracing::warn!("Login for {} failed: {}", username, failure);
                login_failure(&failure)
            }
        };

        self.status.finish(error).await;

        if outcome == LoginOutcome::Success {
            tracing::info!("Signed in as {}", username);
            self.get_profile().await;
        }
        outcome
    }

    /// Drop the user, the token and the persisted token.
    pub async fn logout(&self) {
        {
            let mut identity = self.identity.write().await;
            identity.user = None;
            identity.token = None;
        }
        if let Err(e) = self.storage.clear() {
            tracing::warn!("Could not remove persisted token: {}", e);
        }
    }

    /// Logout caused by the backend rejecting `token`.
    ///
    /// A rejection of a token that is no longer current leaves the session alone.
    pub(crate) async fn expire(&self, token: &str) {
        {
            let mut identity = self.identity.write().await;
            if identity.token.as_deref() != Some(token) {
                tracing::debug!("Ignoring rejection of a superseded token");
                return;
            }
            tracing::warn!("Session rejected by the backend, signing out");
            identity.user = None;
            identity.token = None;
        }
        if let Err(e) = self.storage.clear() {
            tracing::warn!("Could not remove persisted token: {}", e);
        }
    }

    /// Create a new (pending) account. Does not sign in.
    pub async fn register(&self, request: &RegisterRequest) -> bool {
        self.status.begin().await;
        let result = self
            .api
            .send_unit(reqwest::Method::POST, "/register", None, Some(request))
            .await;

        match result {
            Ok(()) => {
                tracing::info!("Registered account {}", request.username);
                self.status.finish(None).await;
                true
            }
            Err(failure) => {
                tracing::warn!("Registration of {} failed: {}", request.username, failure);
                let error = StoreError::from_failure(&failure, "Registration failed.");
                self.status.finish(Some(error)).await;
                false
            }
        }
    }

    /// Fetch the full profile and merge it into the current user.
    pub async fn get_profile(&self) -> bool {
        let Some(token) = self.token().await else {
            self.status.reject(StoreError::no_session()).await;
            return false;
        };

        self.status.begin().await;
        let result = self
            .api
            .get::<ProfileEnvelope>("/profile", Some(&token))
            .await;
        self.apply_profile(&token, result, "Could not load the profile.")
            .await
    }

    /// Update editable profile fields.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> bool {
        let Some(token) = self.token().await else {
            self.status.reject(StoreError::no_session()).await;
            return false;
        };

        self.status.begin().await;
        let result = self
            .api
            .put::<_, ProfileEnvelope>("/profile", Some(&token), update)
            .await;
        self.apply_profile(&token, result, "Could not update the profile.")
            .await
    }

    async fn apply_profile(
        &self,
        token: &str,
        result: Result<ProfileEnvelope, ApiFailure>,
        fallback: &str,
    ) -> bool {
        match result {
            Ok(envelope) => {
                let mut identity = self.identity.write().await;
                // The session may have changed hands while the request was out.
                if identity.token.as_deref() == Some(token) {
                    if let Some(user) = identity.user.as_mut() {
                        user.merge_from(&envelope.user);
                    }
                }
                drop(identity);
                self.status.finish(None).await;
                true
            }
            Err(failure) => {
                tracing::warn!("{} {}", fallback, failure);
                let error = StoreError::from_failure(&failure, fallback);
                if failure.is_unauthorized() {
                    self.expire(token).await;
                }
                self.status.finish(Some(error)).await;
                false
            }
        }
    }

    async fn establish(&self, token: String, claims: &Claims) {
        let mut identity = self.identity.write().await;
        identity.user = Some(User::minimal(claims.username.clone(), claims.role));
        identity.token = Some(token);
    }

    pub(crate) async fn reset(&self) {
        *self.identity.write().await = Identity::default();
        self.status.reset().await;
    }
}

fn login_failure(failure: &ApiFailure) -> (LoginOutcome, Option<StoreError>) {
    match failure.status() {
        Some(StatusCode::FORBIDDEN) => (
            LoginOutcome::Inactive,
            Some(StoreError::AccountInactive(
                "Your account is not active yet. Please contact support.".to_string(),
            )),
        ),
        Some(StatusCode::UNAUTHORIZED) | Some(StatusCode::NOT_FOUND) => (
            LoginOutcome::Error,
            Some(StoreError::InvalidCredentials(
                "Invalid username or password.".to_string(),
            )),
        ),
        _ => (
            LoginOutcome::Error,
            Some(StoreError::from_failure(failure, "Could not sign in.")),
        ),
    }
}
