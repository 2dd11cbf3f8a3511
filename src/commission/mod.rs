//! Commission calculation.
//!
//! The platform keeps a percentage of each sale; there is no fixed fee.

use serde::{Deserialize, Serialize};

use crate::models::Commission;

/// Merchant pricing tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Standard,
    Premium,
    Enterprise,
}

/// Percentage rates per tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionRates {
    pub standard: f64,
    pub premium: f64,
    pub enterprise: f64,
}

impl Default for CommissionRates {
    fn default() -> Self {
        Self {
            standard: 2.9,
            premium: 1.9,
            enterprise: 0.9,
        }
    }
}

impl CommissionRates {
    pub fn rate_for(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Standard => self.standard,
            Tier::Premium => self.premium,
            Tier::Enterprise => self.enterprise,
        }
    }
}

/// Round to whole cents, halves away from zero.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Fee and net amount for `amount` at `rate` percent.
pub fn calculate_commission(amount: f64, rate: f64) -> Commission {
    let amount = non_negative(amount);
    let rate = non_negative(rate);
    let fee = round_cents(amount * rate / 100.0);

    Commission {
        percentage: rate,
        amount: fee,
        total: round_cents(amount - fee),
    }
}
