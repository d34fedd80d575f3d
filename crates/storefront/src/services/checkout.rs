//! Checkout totals and receipts.
//!
//! There is no payment gateway. Completing a checkout computes the final
//! summary, empties the cart, and hands back a receipt.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cartwheel_core::{CurrencyCode, Price};

use crate::models::{Cart, LineItem};

/// Tax and shipping rates applied at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutRates {
    /// Fraction of the subtotal charged as tax (0.10 = 10%).
    pub tax_rate: Decimal,
    /// Subtotals strictly above this ship free.
    pub free_shipping_over: Decimal,
    /// Shipping charged otherwise.
    pub flat_shipping: Decimal,
    pub currency: CurrencyCode,
}

impl Default for CheckoutRates {
    fn default() -> Self {
        Self {
            tax_rate: Decimal::new(10, 2),
            free_shipping_over: Decimal::new(50, 0),
            flat_shipping: Decimal::new(999, 2),
            currency: CurrencyCode::USD,
        }
    }
}

/// Order totals for a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSummary {
    pub subtotal: Price,
    pub tax: Price,
    pub shipping: Price,
    pub total: Price,
    pub item_count: u32,
}

impl CheckoutSummary {
    /// Compute totals for `cart` at the given rates.
    #[must_use]
    pub fn compute(cart: &Cart, rates: &CheckoutRates) -> Self {
        let subtotal = cart.subtotal();
        let tax = Price::new(subtotal * rates.tax_rate, rates.currency).rounded();
        let shipping = if subtotal > rates.free_shipping_over {
            Price::zero(rates.currency)
        } else {
            Price::new(rates.flat_shipping, rates.currency).rounded()
        };
        let subtotal = Price::new(subtotal, rates.currency).rounded();
        let total = Price::new(subtotal.amount + tax.amount + shipping.amount, rates.currency);

        Self {
            subtotal,
            tax,
            shipping,
            total,
            item_count: cart.item_count(),
        }
    }

    /// Whether shipping was waived.
    #[must_use]
    pub fn free_shipping(&self) -> bool {
        self.shipping.amount.is_zero()
    }
}

/// Proof of a completed checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub confirmation: Uuid,
    pub placed_at: DateTime<Utc>,
    pub items: Vec<LineItem>,
    pub summary: CheckoutSummary,
}

impl CheckoutReceipt {
    pub(crate) fn new(cart: Cart, rates: &CheckoutRates) -> Self {
        let summary = CheckoutSummary::compute(&cart, rates);
        Self {
            confirmation: Uuid::new_v4(),
            placed_at: Utc::now(),
            items: cart.into_items(),
            summary,
        }
    }
}
