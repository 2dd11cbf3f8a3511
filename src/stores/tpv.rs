//! Point-of-sale: product catalogue, cart and checkout.

use chrono::Utc;
use tokio::sync::RwLock;

use super::{StoreContext, StoreStatus};
use crate::commission::round_cents;
use crate::errors::StoreError;
use crate::models::{
    CartItem, CheckoutEnvelope, CheckoutSale, CheckoutStatus, NewCheckout, NewProduct, Product,
    ProductEnvelope, ProductUpdate, ProductsEnvelope,
};

/// Cart lines, one per product id, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Add `quantity` units, merging with an existing line for the product.
    pub fn add(&mut self, product: Product, quantity: u32) {
        if quantity == 0 {
            return;
        }
        match self.items.iter_mut().find(|i| i.product.id == product.id) {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => self.items.push(CartItem { product, quantity }),
        }
    }

    pub fn remove(&mut self, product_id: u64) {
        self.items.retain(|i| i.product.id != product_id);
    }

    /// Set the quantity of a line; zero removes it.
    pub fn set_quantity(&mut self, product_id: u64, quantity: u32) {
        if quantity == 0 {
            self.remove(product_id);
        } else if let Some(item) = self.items.iter_mut().find(|i| i.product.id == product_id) {
            item.quantity = quantity;
        }
    }

    pub fn total(&self) -> f64 {
        round_cents(self.items.iter().map(CartItem::line_total).sum())
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[derive(Debug, Default)]
struct TpvState {
    products: Vec<Product>,
    cart: Cart,
    current_sale: Option<CheckoutSale>,
}

pub struct TpvStore {
    ctx: StoreContext,
    state: RwLock<TpvState>,
    status: StoreStatus,
}

impl TpvStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            state: RwLock::new(TpvState::default()),
            status: StoreStatus::default(),
        }
    }

    pub async fn products(&self) -> Vec<Product> {
        self.state.read().await.products.clone()
    }

    pub async fn cart(&self) -> Vec<CartItem> {
        self.state.read().await.cart.items().to_vec()
    }

    pub async fn current_sale(&self) -> Option<CheckoutSale> {
        self.state.read().await.current_sale.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.status.is_loading().await
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.status.last_error().await
    }

    // ==================== CATALOGUE ====================

    /// GET /products
    pub async fn fetch_products(&self) -> bool {
        let result = self
            .ctx
            .call(&self.status, "Could not load products.", |api, token| async move {
                api.get::<ProductsEnvelope>("/products", Some(&token)).await
            })
            .await;

        match result {
            Some(envelope) => {
                self.state.write().await.products = envelope.products;
                true
            }
            None => false,
        }
    }

    /// POST /products
    pub async fn add_product(&self, product: &NewProduct) -> bool {
        if product.name.trim().is_empty() {
            self.status
                .reject(StoreError::Validation("Name is required".to_string()))
                .await;
            return false;
        }

        let result = self
            .ctx
            .call(&self.status, "Could not add the product.", |api, token| async move {
                api.post::<_, ProductEnvelope>("/products", Some(&token), product)
                    .await
            })
            .await;

        match result {
            Some(envelope) => {
                self.state.write().await.products.push(envelope.product);
                true
            }
            None => false,
        }
    }

    /// PUT /products/{id}
    pub async fn update_product(&self, product_id: u64, update: &ProductUpdate) -> bool {
        let path = format!("/products/{}", product_id);
        let result = self
            .ctx
            .call(&self.status, "Could not update the product.", |api, token| {
                let path = &path;
                async move {
                    api.put::<_, ProductEnvelope>(path, Some(&token), update)
                        .await
                }
            })
            .await;

        let Some(envelope) = result else {
            return false;
        };
        let mut state = self.state.write().await;
        if let Some(product) = state.products.iter_mut().find(|p| p.id == product_id) {
            *product = envelope.product;
        }
        true
    }

    // ==================== CART ====================

    pub async fn add_to_cart(&self, product: Product, quantity: u32) {
        self.state.write().await.cart.add(product, quantity);
    }

    pub async fn remove_from_cart(&self, product_id: u64) {
        self.state.write().await.cart.remove(product_id);
    }

    pub async fn update_quantity(&self, product_id: u64, quantity: u32) {
        self.state
            .write()
            .await
            .cart
            .set_quantity(product_id, quantity);
    }

    pub async fn cart_total(&self) -> f64 {
        self.state.read().await.cart.total()
    }

    /// Empty the cart and forget the sale in progress.
    pub async fn clear_cart(&self) {
        let mut state = self.state.write().await;
        state.cart.clear();
        state.current_sale = None;
    }

    // ==================== CHECKOUT ====================

    /// POST /sales - open a sale for the current cart.
    pub async fn create_sale(&self, payment_method: &str) -> Option<CheckoutSale> {
        let (items, total) = {
            let state = self.state.read().await;
            (state.cart.items().to_vec(), state.cart.total())
        };
        if items.is_empty() {
            self.status
                .reject(StoreError::Validation("The cart is empty".to_string()))
                .await;
            return None;
        }

        let body = NewCheckout {
            items: &items,
            total,
            payment_method,
            reference: format!("SALE-{}", Utc::now().timestamp_millis()),
        };
        let sale = self
            .ctx
            .call(&self.status, "Could not create the sale.", |api, token| {
                let body = &body;
                async move {
                    api.post::<_, CheckoutEnvelope>("/sales", Some(&token), body)
                        .await
                }
            })
            .await?
            .sale;

        tracing::info!("Opened checkout sale {} for {:.2}", sale.id, sale.total);
        self.state.write().await.current_sale = Some(sale.clone());
        Some(sale)
    }

    /// PUT /sales/{id}/complete
    pub async fn complete_sale(&self, sale_id: u64) -> bool {
        self.close_sale(sale_id, CheckoutStatus::Completed).await
    }

    /// PUT /sales/{id}/cancel
    pub async fn cancel_sale(&self, sale_id: u64) -> bool {
        self.close_sale(sale_id, CheckoutStatus::Cancelled).await
    }

    async fn close_sale(&self, sale_id: u64, next: CheckoutStatus) -> bool {
        let current = self
            .current_sale()
            .await
            .filter(|s| s.id == sale_id)
            .map(|s| s.status);
        if let Some(current) = current {
            if !current.can_transition_to(next) {
                self.status
                    .reject(StoreError::Validation(
                        "This sale is already closed.".to_string(),
                    ))
                    .await;
                return false;
            }
        }

        let (action, fallback) = match next {
            CheckoutStatus::Completed => ("complete", "Could not complete the sale."),
            _ => ("cancel", "Could not cancel the sale."),
        };
        let path = format!("/sales/{}/{}", sale_id, action);
        let confirmed = self
            .ctx
            .call(&self.status, fallback, |api, token| {
                let path = &path;
                async move {
                    api.send_unit(reqwest::Method::PUT, path, Some(&token), None::<&()>)
                        .await
                }
            })
            .await
            .is_some();

        if confirmed {
            tracing::info!("Checkout sale {} {}", sale_id, action);
            let mut state = self.state.write().await;
            state.cart.clear();
            state.current_sale = None;
        }
        confirmed
    }

    pub(crate) async fn reset(&self) {
        *self.state.write().await = TpvState::default();
        self.status.reset().await;
    }
}
