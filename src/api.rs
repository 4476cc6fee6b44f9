//! HTTP surface
//!
//! JSON in, JSON out; CORS is open to any origin and the CORS layer answers
//! pre-flight requests. Catalog endpoints proxy the fulfillment provider
//! verbatim.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domain::address::ShippingAddress;
use crate::domain::geo;
use crate::error::{ApiError, Result};
use crate::fulfillment::{self, FulfillmentOutcome, MetaCartItem};
use crate::printful::{RateItem, ShippingRateRequest};
use crate::stripe::{self, CheckoutSession, CreateSessionParams, SessionLineItem, WebhookEvent};
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/shops", get(list_shops))
        .route("/api/shops/:shop_id/products", get(list_products))
        .route("/api/shops/:shop_id/products/:product_id", get(get_product))
        .route("/api/calculate-shipping", post(calculate_shipping))
        .route("/api/create-checkout-session", post(create_checkout_session))
        .route("/api/create-printful-order", post(create_printful_order))
        .route("/api/webhook", post(webhook))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
        "environment": {
            "has_printful_token": state.config.printful_token.is_some(),
            "has_stripe_secret": state.config.stripe_secret_key.is_some(),
            "has_webhook_secret": state.config.stripe_webhook_secret.is_some(),
        },
    }))
}

async fn list_shops(State(state): State<AppState>) -> Result<Json<Value>> {
    Ok(Json(state.printful.list_stores().await?))
}

// The provider token already pins the store; the path segment only keeps
// the route shape stable for the client.
async fn list_products(State(state): State<AppState>, Path(_shop_id): Path<String>) -> Result<Json<Value>> {
    Ok(Json(state.printful.list_store_products().await?))
}

async fn get_product(
    State(state): State<AppState>,
    Path((_shop_id, product_id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    Ok(Json(state.printful.get_store_product(&product_id).await?))
}

#[derive(Debug, Deserialize)]
struct CalculateShippingRequest {
    recipient: ShippingAddress,
    #[serde(default)]
    items: Vec<MetaCartItem>,
}

async fn calculate_shipping(
    State(state): State<AppState>,
    Json(request): Json<CalculateShippingRequest>,
) -> Result<Json<Value>> {
    if request.items.is_empty() {
        return Err(ApiError::Validation("at least one item is required".into()));
    }
    let rate_request = ShippingRateRequest {
        recipient: request.recipient,
        items: request
            .items
            .iter()
            .map(|item| RateItem { variant_id: item.variant_id, quantity: item.quantity })
            .collect(),
    };
    Ok(Json(state.printful.shipping_rates(&rate_request).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateCheckoutSessionRequest {
    items: Vec<CheckoutLineItem>,
    #[serde(default)]
    cart_items: Option<Value>,
    #[serde(default)]
    shipping_address: Option<ShippingAddress>,
    #[serde(default)]
    shipping_method: Option<Value>,
    #[serde(default)]
    success_url: Option<String>,
    #[serde(default)]
    cancel_url: Option<String>,
}

/// Display line item; `price` is in major units (dollars).
#[derive(Debug, Deserialize)]
struct CheckoutLineItem {
    name: String,
    price: Decimal,
    quantity: i64,
    #[serde(default)]
    images: Vec<String>,
}

async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CreateCheckoutSessionRequest>,
) -> Result<Json<Value>> {
    if request.items.is_empty() {
        return Err(ApiError::Validation("at least one line item is required".into()));
    }
    let line_items = request
        .items
        .iter()
        .map(|item| {
            let unit_amount_cents = (item.price * Decimal::from(100))
                .round()
                .to_i64()
                .ok_or_else(|| ApiError::Validation(format!("invalid price for line item '{}'", item.name)))?;
            Ok(SessionLineItem {
                name: item.name.clone(),
                images: item.images.clone(),
                unit_amount_cents,
                quantity: item.quantity,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let metadata = vec![
        (
            "cartItems".to_string(),
            serde_json::to_string(&request.cart_items.unwrap_or_else(|| json!([])))
                .map_err(|e| ApiError::Validation(e.to_string()))?,
        ),
        (
            "shippingAddress".to_string(),
            serde_json::to_string(&request.shipping_address.clone().unwrap_or_default())
                .map_err(|e| ApiError::Validation(e.to_string()))?,
        ),
        (
            "shippingMethod".to_string(),
            serde_json::to_string(&request.shipping_method.unwrap_or_else(|| json!({})))
                .map_err(|e| ApiError::Validation(e.to_string()))?,
        ),
    ];

    let base = &state.config.public_base_url;
    let params = CreateSessionParams {
        line_items,
        success_url: request
            .success_url
            .unwrap_or_else(|| format!("{base}/success?session_id={{CHECKOUT_SESSION_ID}}")),
        cancel_url: request.cancel_url.unwrap_or_else(|| format!("{base}/")),
        metadata,
        allowed_countries: request
            .shipping_address
            .is_some()
            .then(|| geo::CHECKOUT_COUNTRIES.iter().map(|c| (*c).to_string()).collect()),
    };
    let session = state.stripe.create_checkout_session(&params).await?;
    Ok(Json(json!({ "sessionId": session.id, "url": session.url })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderRequest {
    #[serde(default)]
    session_id: String,
}

/// Client-triggered fallback path: surfaces failures to the caller.
async fn create_printful_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<Json<Value>> {
    if request.session_id.trim().is_empty() {
        return Err(ApiError::Validation("Session ID required".into()));
    }
    match fulfillment::fulfill_session(&state, request.session_id.trim()).await? {
        FulfillmentOutcome::Submitted(response) => {
            let order = response.get("result").cloned().unwrap_or(response);
            Ok(Json(json!({ "success": true, "order": order })))
        }
        FulfillmentOutcome::Duplicate => Ok(Json(json!({ "success": true, "duplicate": true }))),
    }
}

/// Event-driven path. Per provider convention this endpoint always
/// acknowledges the delivery; fulfillment failures are logged, not
/// surfaced, so the provider does not retry into a double submission.
async fn webhook(State(state): State<AppState>, headers: HeaderMap, body: String) -> Result<Json<Value>> {
    if let Some(secret) = state.config.stripe_webhook_secret.as_deref() {
        let signature = headers
            .get("stripe-signature")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if let Err(err) = stripe::verify_signature(&body, signature, secret) {
            // Deliberate dev fallback: keep processing unauthenticated events.
            tracing::warn!(error = %err, "webhook signature verification failed, processing anyway");
        }
    } else {
        tracing::warn!("STRIPE_WEBHOOK_SECRET not set, accepting webhook without verification");
    }

    let event: WebhookEvent = serde_json::from_str(&body)
        .map_err(|e| ApiError::Validation(format!("invalid webhook payload: {e}")))?;
    if event.event_type == "checkout.session.completed" {
        match serde_json::from_value::<CheckoutSession>(event.data.object) {
            Ok(session) if session.is_paid() => {
                match fulfillment::fulfill_session(&state, &session.id).await {
                    Ok(FulfillmentOutcome::Submitted(_)) => {
                        tracing::info!(session = %session.id, "fulfillment order created from webhook");
                    }
                    Ok(FulfillmentOutcome::Duplicate) => {
                        tracing::info!(session = %session.id, "webhook session already fulfilled");
                    }
                    Err(err) => {
                        tracing::error!(session = %session.id, error = %err, "webhook fulfillment failed");
                    }
                }
            }
            Ok(session) => {
                tracing::info!(session = %session.id, status = %session.payment_status, "checkout completed without captured payment");
            }
            Err(err) => {
                tracing::error!(error = %err, "webhook event carried an unreadable session object");
            }
        }
    }
    Ok(Json(json!({ "received": true })))
}
