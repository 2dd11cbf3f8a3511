//! Account administration (admin only).

use tokio::sync::RwLock;

use super::{StoreContext, StoreStatus};
use crate::errors::StoreError;
use crate::models::{StatusChange, User, UserStatus, UsersEnvelope};

pub struct UserStore {
    ctx: StoreContext,
    users: RwLock<Vec<User>>,
    status: StoreStatus,
}

impl UserStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            users: RwLock::new(Vec::new()),
            status: StoreStatus::default(),
        }
    }

    pub async fn users(&self) -> Vec<User> {
        self.users.read().await.clone()
    }

    pub async fn users_by_status(&self, status: UserStatus) -> Vec<User> {
        self.users
            .read()
            .await
            .iter()
            .filter(|u| u.status == status)
            .cloned()
            .collect()
    }

    pub async fn is_loading(&self) -> bool {
        self.status.is_loading().await
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.status.last_error().await
    }

    /// GET /users
    pub async fn fetch_users(&self) -> bool {
        let result = self
            .ctx
            .call(&self.status, "Could not load users.", |api, token| async move {
                api.get::<UsersEnvelope>("/users", Some(&token)).await
            })
            .await;

        match result {
            Some(envelope) => {
                *self.users.write().await = envelope.users;
                true
            }
            None => false,
        }
    }

    /// PUT /users/{username}/status
    pub async fn update_user_status(&self, username: &str, next: UserStatus) -> bool {
        let current = self
            .users
            .read()
            .await
            .iter()
            .find(|u| u.username == username)
            .map(|u| u.status);

        if let Some(current) = current {
            if !current.can_transition_to(next) {
                self.status
                    .reject(StoreError::Validation(format!(
                        "Accounts cannot move from {} to {}.",
                        current.as_str(),
                        next.as_str()
                    )))
                    .await;
                return false;
            }
        }

        let path = format!("/users/{}/status", username);
        let change = StatusChange { status: next };
        let confirmed = self
            .ctx
            .call(
                &self.status,
                "Could not update the user status.",
                |api, token| {
                    let (path, change) = (&path, &change);
                    async move {
                        api.send_unit(reqwest::Method::PUT, path, Some(&token), Some(change))
                            .await
                    }
                },
            )
            .await
            .is_some();

        if confirmed {
            tracing::info!("User {} is now {}", username, next.as_str());
            if let Some(user) = self
                .users
                .write()
                .await
                .iter_mut()
                .find(|u| u.username == username)
            {
                user.status = next;
            }
        }
        confirmed
    }

    pub(crate) async fn reset(&self) {
        self.users.write().await.clear();
        self.status.reset().await;
    }
}
