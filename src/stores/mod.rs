//! Domain stores.
//!
//! Each store owns one cached collection and the operations that change it
//! through the backend. Local state is only patched after the server confirms.

mod apikeys;
mod invoices;
mod payments;
mod sales;
mod stats;
mod tickets;
mod tpv;
mod users;

pub use apikeys::*;
pub use invoices::*;
pub use payments::*;
pub use sales::*;
pub use stats::*;
pub use tickets::*;
pub use tpv::*;
pub use users::*;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::api::ApiClient;
use crate::errors::{ApiFailure, StoreError};
use crate::session::Session;

#[derive(Debug, Default)]
struct StatusInner {
    in_flight: usize,
    last_error: Option<StoreError>,
}

/// Loading flag and last error of one store.
///
/// Loading stays set while any operation of the store is in flight.
#[derive(Debug, Default)]
pub struct StoreStatus {
    inner: RwLock<StatusInner>,
}

impl StoreStatus {
    pub async fn is_loading(&self) -> bool {
        self.inner.read().await.in_flight > 0
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.inner.read().await.last_error.clone()
    }

    /// Start an operation; the previous error is dropped.
    pub(crate) async fn begin(&self) {
        let mut inner = self.inner.write().await;
        inner.in_flight += 1;
        inner.last_error = None;
    }

    pub(crate) async fn finish(&self, error: Option<StoreError>) {
        let mut inner = self.inner.write().await;
        inner.in_flight = inner.in_flight.saturating_sub(1);
        if error.is_some() {
            inner.last_error = error;
        }
    }

    /// Refuse an operation locally, without a round trip.
    pub(crate) async fn reject(&self, error: StoreError) {
        self.inner.write().await.last_error = Some(error);
    }

    pub(crate) async fn reset(&self) {
        *self.inner.write().await = StatusInner::default();
    }
}

/// What every store needs to reach the backend.
#[derive(Clone)]
pub struct StoreContext {
    api: ApiClient,
    session: Arc<Session>,
}

impl StoreContext {
    pub fn new(api: ApiClient, session: Arc<Session>) -> Self {
        Self { api, session }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Run one authenticated request under `status`.
    ///
    /// The token is read at call time. A 401 ends the session if that token is
    /// still the current one; the error is recorded on `status` either way.
    pub(crate) async fn call<T, F, Fut>(
        &self,
        status: &StoreStatus,
        fallback: &str,
        request: F,
    ) -> Option<T>
    where
        F: FnOnce(ApiClient, String) -> Fut,
        Fut: Future<Output = Result<T, ApiFailure>>,
    {
        status.begin().await;

        let Some(token) = self.session.token().await else {
            tracing::warn!("{} (no active session)", fallback);
            status.finish(Some(StoreError::no_session())).await;
            return None;
        };

        match request(self.api.clone(), token.clone()).await {
            Ok(value) => {
                status.finish(None).await;
                Some(value)
            }
            Err(failure) => {
                tracing::warn!("{} {}", fallback, failure);
                let error = StoreError::from_failure(&failure, fallback);
                if failure.is_unauthorized() {
                    self.session.expire(&token).await;
                }
                status.finish(Some(error)).await;
                None
            }
        }
    }
}
