//! Dashboard statistics.

use tokio::sync::RwLock;

use super::{StoreContext, StoreStatus};
use crate::errors::StoreError;
use crate::models::{Stats, StatsEnvelope};

pub struct StatsStore {
    ctx: StoreContext,
    stats: RwLock<Option<Stats>>,
    status: StoreStatus,
}

impl StatsStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            stats: RwLock::new(None),
            status: StoreStatus::default(),
        }
    }

    pub async fn stats(&self) -> Option<Stats> {
        self.stats.read().await.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.status.is_loading().await
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.status.last_error().await
    }

    /// GET /stats
    pub async fn fetch_stats(&self) -> bool {
        let result = self
            .ctx
            .call(&self.status, "Could not load statistics.", |api, token| async move {
                api.get::<StatsEnvelope>("/stats", Some(&token)).await
            })
            .await;

        match result {
            Some(envelope) => {
                *self.stats.write().await = Some(envelope.stats);
                true
            }
            None => false,
        }
    }

    pub(crate) async fn reset(&self) {
        *self.stats.write().await = None;
        self.status.reset().await;
    }
}
