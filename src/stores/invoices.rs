//! Invoices issued to the signed-in merchant.

use tokio::sync::RwLock;

use super::{StoreContext, StoreStatus};
use crate::errors::StoreError;
use crate::models::{
    Invoice, InvoiceEnvelope, InvoicePdf, InvoiceStatus, InvoicesEnvelope, NewInvoice,
};

const PDF_MIME: &str = "application/pdf";

pub struct InvoiceStore {
    ctx: StoreContext,
    invoices: RwLock<Vec<Invoice>>,
    status: StoreStatus,
}

impl InvoiceStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            invoices: RwLock::new(Vec::new()),
            status: StoreStatus::default(),
        }
    }

    pub async fn invoices(&self) -> Vec<Invoice> {
        self.invoices.read().await.clone()
    }

    pub async fn invoices_by_status(&self, status: InvoiceStatus) -> Vec<Invoice> {
        self.invoices
            .read()
            .await
            .iter()
            .filter(|i| i.status() == status)
            .cloned()
            .collect()
    }

    pub async fn is_loading(&self) -> bool {
        self.status.is_loading().await
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.status.last_error().await
    }

    /// GET /invoices
    pub async fn fetch_invoices(&self) -> bool {
        let result = self
            .ctx
            .call(&self.status, "Could not load invoices.", |api, token| async move {
                api.get::<InvoicesEnvelope>("/invoices", Some(&token)).await
            })
            .await;

        match result {
            Some(envelope) => {
                tracing::debug!("Loaded {} invoices", envelope.invoices.len());
                *self.invoices.write().await = envelope.invoices;
                true
            }
            None => false,
        }
    }

    /// POST /invoices
    pub async fn create_invoice(&self, invoice: &NewInvoice) -> Option<Invoice> {
        if invoice.customer_code.trim().is_empty() {
            self.status
                .reject(StoreError::Validation("Customer is required".to_string()))
                .await;
            return None;
        }

        let created = self
            .ctx
            .call(&self.status, "Could not create the invoice.", |api, token| async move {
                api.post::<_, InvoiceEnvelope>("/invoices", Some(&token), invoice)
                    .await
            })
            .await?
            .invoice;

        tracing::info!("Created invoice {}", created.codigo);
        self.invoices.write().await.push(created.clone());
        Some(created)
    }

    /// GET /invoices/{id} as a PDF document.
    pub async fn download_invoice_pdf(&self, invoice_id: u64) -> Option<InvoicePdf> {
        let path = format!("/invoices/{}", invoice_id);
        let bytes = self
            .ctx
            .call(&self.status, "Could not download the invoice.", |api, token| {
                let path = &path;
                async move { api.get_bytes(path, Some(&token), PDF_MIME).await }
            })
            .await?;

        tracing::info!("Downloaded invoice {} ({} bytes)", invoice_id, bytes.len());
        Some(InvoicePdf::new(invoice_id, bytes))
    }

    pub(crate) async fn reset(&self) {
        self.invoices.write().await.clear();
        self.status.reset().await;
    }
}
