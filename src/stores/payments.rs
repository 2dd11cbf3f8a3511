//! Payment processing: card intents, cash and Bizum.

use tokio::sync::RwLock;

use super::{StoreContext, StoreStatus};
use crate::errors::StoreError;
use crate::models::{
    BizumPayment, CashPayment, ConfirmCard, IntentEnvelope, NewIntent, Payment, PaymentEnvelope,
    PaymentIntent, PaymentStatus, Refund,
};

pub const DEFAULT_CURRENCY: &str = "EUR";

#[derive(Debug, Default)]
struct PaymentState {
    current_payment: Option<Payment>,
    payment_intent: Option<PaymentIntent>,
}

pub struct PaymentStore {
    ctx: StoreContext,
    state: RwLock<PaymentState>,
    status: StoreStatus,
}

impl PaymentStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            state: RwLock::new(PaymentState::default()),
            status: StoreStatus::default(),
        }
    }

    pub async fn current_payment(&self) -> Option<Payment> {
        self.state.read().await.current_payment.clone()
    }

    pub async fn payment_intent(&self) -> Option<PaymentIntent> {
        self.state.read().await.payment_intent.clone()
    }

    pub async fn is_loading(&self) -> bool {
        self.status.is_loading().await
    }

    pub async fn last_error(&self) -> Option<StoreError> {
        self.status.last_error().await
    }

    async fn reject_amount(&self, amount: f64) -> bool {
        if amount.is_finite() && amount > 0.0 {
            return false;
        }
        self.status
            .reject(StoreError::Validation(
                "Amount must be greater than zero".to_string(),
            ))
            .await;
        true
    }

    /// POST /payments/intent
    pub async fn create_payment_intent(
        &self,
        amount: f64,
        currency: &str,
    ) -> Option<PaymentIntent> {
        if self.reject_amount(amount).await {
            return None;
        }

        let body = NewIntent { amount, currency };
        let intent = self
            .ctx
            .call(
                &self.status,
                "Could not create the payment intent.",
                |api, token| {
                    let body = &body;
                    async move {
                        api.post::<_, IntentEnvelope>("/payments/intent", Some(&token), body)
                            .await
                    }
                },
            )
            .await?
            .payment_intent;

        self.state.write().await.payment_intent = Some(intent.clone());
        Some(intent)
    }

    /// POST /payments/intent/{id}/confirm
    pub async fn confirm_card_payment(
        &self,
        intent_id: &str,
        payment_method_id: &str,
    ) -> Option<Payment> {
        let path = format!("/payments/intent/{}/confirm", intent_id);
        let body = ConfirmCard { payment_method_id };
        let payment = self
            .ctx
            .call(&self.status, "Could not process the payment.", |api, token| {
                let (path, body) = (&path, &body);
                async move {
                    api.post::<_, PaymentEnvelope>(path, Some(&token), body)
                        .await
                }
            })
            .await?
            .payment;

        tracing::info!("Card payment {} is {}", payment.id, payment.status.as_str());
        let mut state = self.state.write().await;
        state.current_payment = Some(payment.clone());
        if state.payment_intent.as_ref().is_some_and(|i| i.id == intent_id) {
            state.payment_intent = None;
        }
        Some(payment)
    }

    /// POST /payments/cash
    pub async fn process_cash_payment(&self, amount: f64) -> Option<Payment> {
        if self.reject_amount(amount).await {
            return None;
        }

        let body = CashPayment { amount };
        let payment = self
            .ctx
            .call(
                &self.status,
                "Could not process the cash payment.",
                |api, token| {
                    let body = &body;
                    async move {
                        api.post::<_, PaymentEnvelope>("/payments/cash", Some(&token), body)
                            .await
                    }
                },
            )
            .await?
            .payment;

        self.state.write().await.current_payment = Some(payment.clone());
        Some(payment)
    }

    /// POST /payments/bizum
    pub async fn process_bizum_payment(&self, amount: f64, phone: &str) -> Option<Payment> {
        if self.reject_amount(amount).await {
            return None;
        }
        if phone.trim().is_empty() {
            self.status
                .reject(StoreError::Validation("Phone is required".to_string()))
                .await;
            return None;
        }

        let body = BizumPayment { amount, phone };
        let payment = self
            .ctx
            .call(
                &self.status,
                "Could not process the Bizum payment.",
                |api, token| {
                    let body = &body;
                    async move {
                        api.post::<_, PaymentEnvelope>("/payments/bizum", Some(&token), body)
                            .await
                    }
                },
            )
            .await?
            .payment;

        self.state.write().await.current_payment = Some(payment.clone());
        Some(payment)
    }

    /// POST /payments/{id}/refund; `None` refunds the full amount.
    pub async fn refund_payment(&self, payment_id: u64, amount: Option<f64>) -> Option<Payment> {
        if let Some(current) = self.current_payment().await.filter(|p| p.id == payment_id) {
            if !current.status.can_transition_to(PaymentStatus::Refunded) {
                self.status
                    .reject(StoreError::Validation(format!(
                        "A {} payment cannot be refunded.",
                        current.status.as_str()
                    )))
                    .await;
                return None;
            }
        }
        if let Some(amount) = amount {
            if self.reject_amount(amount).await {
                return None;
            }
        }

        let path = format!("/payments/{}/refund", payment_id);
        let body = Refund { amount };
        let payment = self
            .ctx
            .call(&self.status, "Could not refund the payment.", |api, token| {
                let (path, body) = (&path, &body);
                async move {
                    api.post::<_, PaymentEnvelope>(path, Some(&token), body)
                        .await
                }
            })
            .await?
            .payment;

        tracing::info!("Refunded payment {}", payment_id);
        self.replace_current(&payment).await;
        Some(payment)
    }

    /// GET /payments/{id}
    pub async fn get_payment_status(&self, payment_id: u64) -> Option<Payment> {
        let path = format!("/payments/{}", payment_id);
        let payment = self
            .ctx
            .call(
                &self.status,
                "Could not fetch the payment status.",
                |api, token| {
                    let path = &path;
                    async move { api.get::<PaymentEnvelope>(path, Some(&token)).await }
                },
            )
            .await?
            .payment;

        self.replace_current(&payment).await;
        Some(payment)
    }

    async fn replace_current(&self, payment: &Payment) {
        let mut state = self.state.write().await;
        if state
            .current_payment
            .as_ref()
            .is_some_and(|p| p.id == payment.id)
        {
            state.current_payment = Some(payment.clone());
        }
    }

    pub(crate) async fn reset(&self) {
        *self.state.write().await = PaymentState::default();
        self.status.reset().await;
    }
}
