//! Shipping addresses

use serde::{Deserialize, Serialize};

use crate::domain::geo;

/// Address shape shared by the shipping-rate request, the checkout-session
/// metadata bag, and recipient resolution. Every field is optional; the
/// fulfillment flow decides what is required.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address1: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl ShippingAddress {
    pub fn has_line1(&self) -> bool {
        self.address1.as_deref().is_some_and(|a| !a.trim().is_empty())
    }
}

/// Postal-code normalization per country. CA and GB codes are compacted and
/// uppercased; everything else is trimmed only.
pub fn normalize_postal_code(country_code: &str, raw: &str) -> String {
    let trimmed = raw.trim();
    match country_code.trim().to_ascii_uppercase().as_str() {
        "CA" | "GB" => trimmed.split_whitespace().collect::<String>().to_uppercase(),
        _ => trimmed.to_string(),
    }
}

/// The single seam for address capture: a producer yields a structured
/// address or nothing. Widget quirks (polling, shadow DOM) belong in the
/// concrete adapter, never downstream of this trait.
pub trait AddressSource {
    fn address(&self) -> Option<ShippingAddress>;
}

/// Adapter over raw form fields.
#[derive(Clone, Debug, Default)]
pub struct ManualEntry {
    pub name: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state: String,
    pub country: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
}

impl AddressSource for ManualEntry {
    fn address(&self) -> Option<ShippingAddress> {
        let country = self.country.trim().to_ascii_uppercase();
        let address = ShippingAddress {
            name: opt(&self.name),
            address1: opt(&self.address1),
            address2: opt(&self.address2),
            city: opt(&self.city),
            state_code: resolve_state(&country, &self.state),
            country_code: opt(&country),
            zip: opt(&normalize_postal_code(&country, &self.zip)),
            phone: opt(&self.phone),
            email: opt(&self.email),
        };
        if address == ShippingAddress::default() { None } else { Some(address) }
    }
}

/// Two-letter inputs pass through uppercased; full state/province names are
/// looked up in the reference tables.
fn resolve_state(country_code: &str, raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.len() == 2 {
        return Some(trimmed.to_ascii_uppercase());
    }
    geo::state_code(country_code, trimmed)
        .map(str::to_string)
        .or_else(|| Some(trimmed.to_string()))
}

fn opt(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}
