//! Merchant API keys.

use tokio::sync::RwLock;

use super::{StoreContext, StoreStatus};
use crate::errors::StoreError;
use crate::models::{ApiKey, ApiKeyEnvelope, ApiKeysEnvelope, NewApiKey};

pub struct ApiKeyStore {
    ctx: StoreContext,
    api_keys: RwLock<Vec<ApiKey>>,
    status: StoreStatus,
}

impl ApiKeyStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            api_keys: RwLock::new(Vec::new()),
            status: StoreStatus::default(),
        }
    }

    pub async fn api_keys(&self) -> Vec<ApiKey> {
        self.api_keys.read().await.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.status.is_loading().await
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.status.last_error().await
    }

    /// GET /apikeys
    pub async fn fetch_api_keys(&self) -> bool {
        let result = self
            .ctx
            .call(&self.status, "Could not load API keys.", |api, token| async move {
                api.get::<ApiKeysEnvelope>("/apikeys", Some(&token)).await
            })
            .await;

        match result {
            Some(envelope) => {
                *self.api_keys.write().await = envelope.api_keys;
                true
            }
            None => false,
        }
    }

    /// POST /apikeys
    pub async fn create_api_key(&self, name: &str) -> Option<ApiKey> {
        let name = name.trim();
        if name.is_empty() {
            self.status
                .reject(StoreError::Validation("Name is required".to_string()))
                .await;
            return None;
        }

        let body = NewApiKey { name };
        let key = self
            .ctx
            .call(&self.status, "Could not create the API key.", |api, token| {
                let body = &body;
                async move {
                    api.post::<_, ApiKeyEnvelope>("/apikeys", Some(&token), body)
                        .await
                }
            })
            .await?
            .api_key;

        tracing::info!("Created API key {} ({})", key.id, key.name);
        self.api_keys.write().await.push(key.clone());
        Some(key)
    }

    /// DELETE /apikeys/{id}
    pub async fn revoke_api_key(&self, key_id: u64) -> bool {
        let path = format!("/apikeys/{}", key_id);
        let confirmed = self
            .ctx
            .call(&self.status, "Could not revoke the API key.", |api, token| {
                let path = &path;
                async move {
                    api.send_unit(reqwest::Method::DELETE, path, Some(&token), None::<&()>)
                        .await
                }
            })
            .await
            .is_some();

        if confirmed {
            tracing::info!("Revoked API key {}", key_id);
            self.api_keys.write().await.retain(|k| k.id != key_id);
        }
        confirmed
    }

    pub(crate) async fn reset(&self) {
        self.api_keys.write().await.clear();
        self.status.reset().await;
    }
}
