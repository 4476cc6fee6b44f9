//! Shipping quotes

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One rate option from the fulfillment provider. Rates arrive as decimal
/// strings in major currency units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ShippingQuote {
    pub id: String,
    pub name: String,
    pub rate: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, alias = "minDeliveryDays", alias = "min_days", skip_serializing_if = "Option::is_none")]
    pub min_delivery_days: Option<i64>,
    #[serde(default, alias = "maxDeliveryDays", alias = "max_days", skip_serializing_if = "Option::is_none")]
    pub max_delivery_days: Option<i64>,
}

impl ShippingQuote {
    pub fn rate_cents(&self) -> i64 {
        (self.rate * Decimal::from(100)).round().to_i64().unwrap_or(0)
    }
}

/// The provider does not guarantee rate ordering, so sort before picking.
pub fn select_cheapest(mut quotes: Vec<ShippingQuote>) -> Option<ShippingQuote> {
    quotes.sort_by(|a, b| a.rate.cmp(&b.rate));
    quotes.into_iter().next()
}
