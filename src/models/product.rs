//! Catalogue products and point-of-sale checkout models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A product sold at the point of sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub stock: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Request body for adding a product to the catalogue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub price: f64,
    pub category: String,
    pub stock: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Partial product update.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// One cart line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: Product,
    pub quantity: u32,
}

impl CartItem {
    pub fn line_total(&self) -> f64 {
        self.product.price * f64::from(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutStatus {
    Pending,
    Completed,
    Cancelled,
}

impl CheckoutStatus {
    pub fn can_transition_to(self, next: CheckoutStatus) -> bool {
        matches!(
            (self, next),
            (CheckoutStatus::Pending, CheckoutStatus::Completed)
                | (CheckoutStatus::Pending, CheckoutStatus::Cancelled)
        )
    }
}

/// A sale opened from the point-of-sale cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSale {
    pub id: u64,
    #[serde(default)]
    pub items: Vec<CartItem>,
    pub total: f64,
    pub status: CheckoutStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub payment_method: Option<String>,
    pub reference: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewCheckout<'a> {
    pub items: &'a [CartItem],
    pub total: f64,
    pub payment_method: &'a str,
    pub reference: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductsEnvelope {
    #[serde(default)]
    pub products: Vec<Product>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProductEnvelope {
    pub product: Product,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CheckoutEnvelope {
    pub sale: CheckoutSale,
}
