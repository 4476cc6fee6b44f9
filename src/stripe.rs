//! Payment provider client (Stripe hosted checkout)
//!
//! Creates and retrieves checkout sessions and verifies webhook event
//! signatures. Session creation uses the provider's form-encoded bracket
//! syntax; the metadata bag carries cart state as serialized strings
//! through the hosted-checkout redirect.

use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;

use crate::error::{ApiError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Signed webhook timestamps older than this are rejected.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base: String,
    secret_key: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    /// Captured shipping block; newer API versions deliver it as
    /// `shipping_details`.
    #[serde(default, alias = "shipping_details")]
    pub shipping: Option<SessionShipping>,
    #[serde(default)]
    pub metadata: Option<HashMap<String, String>>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status == "paid"
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key).map(String::as_str)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SessionShipping {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: Option<SessionAddress>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SessionAddress {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookEventData {
    pub object: Value,
}

#[derive(Clone, Debug)]
pub struct SessionLineItem {
    pub name: String,
    pub images: Vec<String>,
    pub unit_amount_cents: i64,
    pub quantity: i64,
}

#[derive(Clone, Debug)]
pub struct CreateSessionParams {
    pub line_items: Vec<SessionLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    /// Serialized-string key/value pairs attached to the session.
    pub metadata: Vec<(String, String)>,
    /// When set, the hosted page collects a shipping address limited to
    /// these countries.
    pub allowed_countries: Option<Vec<String>>,
}

impl StripeClient {
    pub fn new(base: &str, secret_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
            secret_key,
        }
    }

    fn secret(&self) -> Result<&str> {
        self.secret_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ApiError::ProviderConfigMissing("STRIPE_SECRET_KEY"))
    }

    pub async fn create_checkout_session(&self, params: &CreateSessionParams) -> Result<CheckoutSession> {
        let secret = self.secret()?;
        let form = encode_session_form(params);
        let response = self
            .http
            .post(format!("{}/v1/checkout/sessions", self.base))
            .bearer_auth(secret)
            .form(&form)
            .send()
            .await?;
        Self::read_session(response).await
    }

    /// Fetch a session with customer and shipping sub-objects expanded.
    pub async fn retrieve_session(&self, session_id: &str) -> Result<CheckoutSession> {
        let secret = self.secret()?;
        let response = self
            .http
            .get(format!("{}/v1/checkout/sessions/{session_id}", self.base))
            .bearer_auth(secret)
            .query(&[
                ("expand[]", "customer"),
                ("expand[]", "customer_details"),
                ("expand[]", "shipping"),
            ])
            .send()
            .await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ApiError::SessionNotFound);
        }
        Self::read_session(response).await
    }

    async fn read_session(response: reqwest::Response) -> Result<CheckoutSession> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Upstream { status: status.as_u16(), body });
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Upstream {
            status: status.as_u16(),
            body: format!("invalid session payload from payment provider: {e}"),
        })
    }
}

fn encode_session_form(params: &CreateSessionParams) -> Vec<(String, String)> {
    let mut form: Vec<(String, String)> = vec![
        ("mode".into(), "payment".into()),
        ("payment_method_types[0]".into(), "card".into()),
        ("success_url".into(), params.success_url.clone()),
        ("cancel_url".into(), params.cancel_url.clone()),
    ];
    for (i, item) in params.line_items.iter().enumerate() {
        form.push((format!("line_items[{i}][price_data][currency]"), "usd".into()));
        form.push((format!("line_items[{i}][price_data][product_data][name]"), item.name.clone()));
        for (j, image) in item.images.iter().enumerate() {
            form.push((format!("line_items[{i}][price_data][product_data][images][{j}]"), image.clone()));
        }
        form.push((format!("line_items[{i}][price_data][unit_amount]"), item.unit_amount_cents.to_string()));
        form.push((format!("line_items[{i}][quantity]"), item.quantity.to_string()));
    }
    for (key, value) in &params.metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }
    if let Some(countries) = &params.allowed_countries {
        for (i, country) in countries.iter().enumerate() {
            form.push((format!("shipping_address_collection[allowed_countries][{i}]"), country.clone()));
        }
    }
    form
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    MalformedHeader,
    #[error("signature timestamp outside tolerance")]
    Expired,
    #[error("no matching signature")]
    Mismatch,
}

/// Verify a webhook payload against the provider's `t=...,v1=...` signature
/// header: HMAC-SHA256 over `"{t}.{payload}"` with the shared signing
/// secret, compared in constant time.
pub fn verify_signature(payload: &str, header: &str, secret: &str) -> std::result::Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<&str> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::MalformedHeader)?;
    if signatures.is_empty() {
        return Err(SignatureError::MalformedHeader);
    }
    if (Utc::now().timestamp() - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(SignatureError::Expired);
    }
    let signed_payload = format!("{timestamp}.{payload}");
    for signature in signatures {
        let Ok(expected) = hex::decode(signature) else { continue };
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Mismatch)?;
        mac.update(signed_payload.as_bytes());
        if mac.verify_slice(&expected).is_ok() {
            return Ok(());
        }
    }
    Err(SignatureError::Mismatch)
}
