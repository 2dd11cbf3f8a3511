//! Green-Sys admin client core.
//!
//! Session handling, role-gated navigation and the REST-backed stores behind the
//! payment and point-of-sale administration front end.

pub mod api;
pub mod auth;
pub mod commission;
pub mod config;
pub mod errors;
pub mod models;
pub mod router;
pub mod session;
pub mod storage;
pub mod stores;

use std::sync::Arc;

use api::ApiClient;
use config::Config;
use session::{Session, SessionFlags};
use storage::{FileTokenStorage, TokenStorage};
use stores::{
    ApiKeyStore, InvoiceStore, PaymentStore, SalesStore, StatsStore, StoreContext, TicketStore,
    TpvStore, UserStore,
};

/// Application context: the session plus every store, built once at startup.
pub struct App {
    pub config: Arc<Config>,
    pub session: Arc<Session>,
    pub router: router::Router,
    pub invoices: InvoiceStore,
    pub sales: SalesStore,
    pub tickets: TicketStore,
    pub api_keys: ApiKeyStore,
    pub users: UserStore,
    pub payments: PaymentStore,
    pub stats: StatsStore,
    pub tpv: TpvStore,
}

impl App {
    /// Build the context with the token persisted at `config.token_path`.
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let storage = Arc::new(FileTokenStorage::new(config.token_path.clone()));
        Self::with_storage(config, storage)
    }

    pub fn with_storage(
        config: Config,
        storage: Arc<dyn TokenStorage>,
    ) -> Result<Self, reqwest::Error> {
        let api = ApiClient::new(&config.api_base_url)?;
        let session = Arc::new(Session::new(api.clone(), storage, config.is_sandbox()));
        let ctx = StoreContext::new(api, session.clone());

        Ok(Self {
            config: Arc::new(config),
            session,
            router: router::Router::default(),
            invoices: InvoiceStore::new(ctx.clone()),
            sales: SalesStore::new(ctx.clone()),
            tickets: TicketStore::new(ctx.clone()),
            api_keys: ApiKeyStore::new(ctx.clone()),
            users: UserStore::new(ctx.clone()),
            payments: PaymentStore::new(ctx.clone()),
            stats: StatsStore::new(ctx.clone()),
            tpv: TpvStore::new(ctx),
        })
    }

    /// Restore a persisted session, if any.
    pub async fn start(&self) -> SessionFlags {
        self.session.restore_session().await;
        let flags = self.session.flags().await;
        tracing::info!(
            authenticated = flags.is_authenticated,
            sandbox = flags.is_sandbox_mode,
            "Client started"
        );
        flags
    }

    /// Guard a navigation against the current session.
    pub async fn navigate(&self, path: &str) -> router::Navigation {
        let flags = self.session.flags().await;
        self.router.navigate(path, &flags).1
    }

    /// Drop all cached state. The persisted token is left for the next start.
    pub async fn shutdown(&self) {
        self.invoices.reset().await;
        self.sales.reset().await;
        self.tickets.reset().await;
        self.api_keys.reset().await;
        self.users.reset().await;
        self.payments.reset().await;
        self.stats.reset().await;
        self.tpv.reset().await;
        self.session.reset().await;
        tracing::info!("Client stopped");
    }
}

#[cfg(test)]
mod tests;
