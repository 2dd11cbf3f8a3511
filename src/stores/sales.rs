//! Merchant sales ledger.

use tokio::sync::RwLock;

use super::{StoreContext, StoreStatus};
use crate::commission::{calculate_commission, CommissionRates, Tier};
use crate::errors::StoreError;
use crate::models::{
    CreateSaleRequest, NewSaleBody, Sale, SaleEnvelope, SaleStatus, SaleStatusChange,
    SalesEnvelope,
};

pub struct SalesStore {
    ctx: StoreContext,
    rates: CommissionRates,
    sales: RwLock<Vec<Sale>>,
    status: StoreStatus,
}

impl SalesStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self::with_rates(ctx, CommissionRates::default())
    }

    pub fn with_rates(ctx: StoreContext, rates: CommissionRates) -> Self {
        Self {
            ctx,
            rates,
            sales: RwLock::new(Vec::new()),
            status: StoreStatus::default(),
        }
    }

    pub async fn sales(&self) -> Vec<Sale> {
        self.sales.read().await.clone()
    }

    pub async fn sales_by_user(&self, user_id: &str) -> Vec<Sale> {
        self.sales
            .read()
            .await
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn status_label(status: SaleStatus) -> &'static str {
        status.label()
    }

    pub async fn is_loading(&self) -> bool {
        self.status.is_loading().await
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.status.last_error().await
    }

    /// GET /sales - replace the cached ledger.
    pub async fn fetch_sales(&self) -> bool {
        let result = self
            .ctx
            .call(&self.status, "Could not load sales.", |api, token| async move {
                api.get::<SalesEnvelope>("/sales", Some(&token)).await
            })
            .await;

        match result {
            Some(envelope) => {
                tracing::debug!("Loaded {} sales", envelope.sales.len());
                *self.sales.write().await = envelope.sales;
                true
            }
            None => false,
        }
    }

    /// POST /sales - record a sale with the standard commission.
    pub async fn create_sale(&self, request: &CreateSaleRequest) -> Option<Sale> {
        self.create_sale_for_tier(request, Tier::Standard).await
    }

    /// POST /sales - record a sale with the commission of the merchant's `tier`.
    pub async fn create_sale_for_tier(
        &self,
        request: &CreateSaleRequest,
        tier: Tier,
    ) -> Option<Sale> {
        let body = NewSaleBody {
            request,
            commission: calculate_commission(request.amount, self.rates.rate_for(tier)),
        };

        let sale = self
            .ctx
            .call(&self.status, "Could not create the sale.", |api, token| {
                let body = &body;
                async move {
                    api.post::<_, SaleEnvelope>("/sales", Some(&token), body)
                        .await
                }
            })
            .await?
            .sale;

        tracing::info!("Created sale {} ({})", sale.id, sale.reference);
        self.sales.write().await.push(sale.clone());
        Some(sale)
    }

    /// PUT /sales/{id} - move a sale to `next`.
    pub async fn update_sale_status(&self, sale_id: u64, next: SaleStatus) -> bool {
        let current = self
            .sales
            .read()
            .await
            .iter()
            .find(|s| s.id == sale_id)
            .map(|s| s.status);

        if let Some(current) = current {
            if !current.can_transition_to(next) {
                self.status
                    .reject(StoreError::Validation(format!(
                        "A {} sale cannot become {}.",
                        current.as_str(),
                        next.as_str()
                    )))
                    .await;
                return false;
            }
        }

        let path = format!("/sales/{}", sale_id);
        let change = SaleStatusChange { status: next };
        let confirmed = self
            .ctx
            .call(&self.status, "Could not update the sale.", |api, token| {
                let (path, change) = (&path, &change);
                async move {
                    api.send_unit(reqwest::Method::PUT, path, Some(&token), Some(change))
                        .await
                }
            })
            .await
            .is_some();

        if confirmed {
            tracing::info!("Sale {} is now {}", sale_id, next.as_str());
            if let Some(sale) = self.sales.write().await.iter_mut().find(|s| s.id == sale_id) {
                sale.status = next;
            }
        }
        confirmed
    }

    pub async fn refund_sale(&self, sale_id: u64) -> bool {
        self.update_sale_status(sale_id, SaleStatus::Refunded).await
    }

    pub(crate) async fn reset(&self) {
        self.sales.write().await.clear();
        self.status.reset().await;
    }
}
