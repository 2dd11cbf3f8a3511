//! Sale model for the merchant sales ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payment state of a recorded sale.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Paid => "paid",
            SaleStatus::Failed => "failed",
            SaleStatus::Refunded => "refunded",
            SaleStatus::Cancelled => "cancelled",
        }
    }

    /// Human readable label shown in listings.
    pub fn label(&self) -> &'static str {
        match self {
            SaleStatus::Pending => "Awaiting payment",
            SaleStatus::Paid => "Paid",
            SaleStatus::Failed => "Failed",
            SaleStatus::Refunded => "Refunded",
            SaleStatus::Cancelled => "Cancelled",
        }
    }

    pub fn can_transition_to(self, next: SaleStatus) -> bool {
        matches!(
            (self, next),
            (SaleStatus::Pending, SaleStatus::Paid)
                | (SaleStatus::Pending, SaleStatus::Failed)
                | (SaleStatus::Pending, SaleStatus::Cancelled)
                | (SaleStatus::Paid, SaleStatus::Refunded)
        )
    }
}

/// Commission retained on a sale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub percentage: f64,
    pub amount: f64,
    pub total: f64,
}

/// A sale recorded for a merchant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: u64,
    pub user_id: String,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reference: String,
    pub status: SaleStatus,
    #[serde(default)]
    pub payment_method: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default)]
    pub commission: Commission,
}

/// Request body for recording a new sale.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSaleRequest {
    pub amount: f64,
    pub description: String,
    pub reference: String,
    pub payment_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewSaleBody<'a> {
    #[serde(flatten)]
    pub request: &'a CreateSaleRequest,
    pub commission: Commission,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SalesEnvelope {
    #[serde(default)]
    pub sales: Vec<Sale>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SaleEnvelope {
    pub sale: Sale,
}

#[derive(Debug, Serialize)]
pub(crate) struct SaleStatusChange {
    pub status: SaleStatus,
}
