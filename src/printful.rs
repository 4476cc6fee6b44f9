//! Fulfillment provider client (Printful)
//!
//! Thin HTTP client over the provider's REST API. Catalog reads pass the
//! provider envelope through untouched; only the shapes this service builds
//! itself (rate requests, order drafts) are typed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::address::ShippingAddress;
use crate::error::{ApiError, Result};

pub const DEFAULT_API_BASE: &str = "https://api.printful.com";

#[derive(Clone)]
pub struct PrintfulClient {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ShippingRateRequest {
    pub recipient: ShippingAddress,
    pub items: Vec<RateItem>,
}

#[derive(Clone, Debug, Serialize)]
pub struct RateItem {
    pub variant_id: i64,
    pub quantity: i64,
}

/// Fully populated recipient as the provider expects it. Resolution fills
/// every field, empty strings included.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    pub name: String,
    pub address1: String,
    pub address2: String,
    pub city: String,
    pub state_code: String,
    pub country_code: String,
    pub zip: String,
    pub phone: String,
    pub email: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderRequest {
    pub external_id: String,
    pub recipient: Recipient,
    pub items: Vec<OrderItem>,
    pub confirm: bool,
    pub update_existing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderItem {
    pub variant_id: i64,
    pub quantity: i64,
}

impl PrintfulClient {
    pub fn new(base: &str, token: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: base.trim_end_matches('/').to_string(),
            token,
        }
    }

    fn token(&self) -> Result<&str> {
        self.token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ApiError::ProviderConfigMissing("PRINTFUL_TOKEN"))
    }

    pub async fn list_stores(&self) -> Result<Value> {
        self.get("/stores").await
    }

    pub async fn list_store_products(&self) -> Result<Value> {
        self.get("/store/products").await
    }

    /// Single store product, including variant pricing and size data.
    pub async fn get_store_product(&self, product_id: &str) -> Result<Value> {
        self.get(&format!("/store/products/{product_id}")).await
    }

    pub async fn shipping_rates(&self, request: &ShippingRateRequest) -> Result<Value> {
        self.post("/shipping/rates", request).await
    }

    pub async fn create_order(&self, order: &OrderRequest) -> Result<Value> {
        tracing::info!(external_id = %order.external_id, items = order.items.len(), "submitting fulfillment order");
        self.post("/orders", order).await
    }

    async fn get(&self, path: &str) -> Result<Value> {
        let token = self.token()?;
        let response = self.http.get(format!("{}{path}", self.base)).bearer_auth(token).send().await?;
        Self::read_json(response).await
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let token = self.token()?;
        let response = self
            .http
            .post(format!("{}{path}", self.base))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Upstream { status: status.as_u16(), body });
        }
        serde_json::from_str(&body).map_err(|e| ApiError::Upstream {
            status: status.as_u16(),
            body: format!("invalid JSON from fulfillment provider: {e}"),
        })
    }
}
