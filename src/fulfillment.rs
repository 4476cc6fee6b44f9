//! Checkout-to-fulfillment reconciliation
//!
//! Maps a paid checkout session plus the cart state smuggled through its
//! metadata bag into a single fulfillment order. Two triggers share this
//! path: the payment provider's webhook and the client's redirect-back
//! fallback. An in-process ledger keyed by session id makes the pair
//! submit at most one order.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::domain::address::ShippingAddress;
use crate::error::{ApiError, Result};
use crate::printful::{OrderItem, OrderRequest, Recipient};
use crate::stripe::CheckoutSession;
use crate::AppState;

const METADATA_CART_ITEMS: &str = "cartItems";
const METADATA_SHIPPING_ADDRESS: &str = "shippingAddress";
const METADATA_SHIPPING_METHOD: &str = "shippingMethod";
const DEFAULT_RECIPIENT_NAME: &str = "Customer";

/// Cart entry as serialized into session metadata by the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaCartItem {
    #[serde(deserialize_with = "lenient_i64")]
    pub variant_id: i64,
    #[serde(deserialize_with = "lenient_i64")]
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Shipping method as serialized into session metadata. Only entries with
/// an id count as a selection; the client stores `{}` when nothing was
/// chosen.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSelection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct SessionMetadata {
    pub cart_items: Vec<MetaCartItem>,
    pub shipping_address: ShippingAddress,
    pub shipping_method: Option<ShippingSelection>,
}

#[derive(Debug)]
pub enum FulfillmentOutcome {
    /// Order submitted; carries the provider's response body.
    Submitted(Value),
    /// Another path already claimed this session; nothing was submitted.
    Duplicate,
}

/// The client serializes numbers inconsistently, so accept integers and
/// numeric strings.
fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().ok_or_else(|| Error::custom("expected an integer")),
        Value::String(s) => s.trim().parse().map_err(Error::custom),
        other => Err(Error::custom(format!("expected an integer, got {other}"))),
    }
}

pub fn parse_metadata(session: &CheckoutSession) -> Result<SessionMetadata> {
    let cart_items = match session.metadata_str(METADATA_CART_ITEMS) {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ApiError::Validation(format!("invalid {METADATA_CART_ITEMS} metadata: {e}")))?,
        None => Vec::new(),
    };
    let shipping_address = match session.metadata_str(METADATA_SHIPPING_ADDRESS) {
        Some(raw) => serde_json::from_str::<Option<ShippingAddress>>(raw)
            .map_err(|e| ApiError::Validation(format!("invalid {METADATA_SHIPPING_ADDRESS} metadata: {e}")))?
            .unwrap_or_default(),
        None => ShippingAddress::default(),
    };
    let shipping_method = match session.metadata_str(METADATA_SHIPPING_METHOD) {
        Some(raw) => serde_json::from_str::<Option<ShippingSelection>>(raw)
            .map_err(|e| ApiError::Validation(format!("invalid {METADATA_SHIPPING_METHOD} metadata: {e}")))?
            .filter(|s| s.id.is_some()),
        None => None,
    };
    Ok(SessionMetadata { cart_items, shipping_address, shipping_method })
}

/// Derive the fulfillment recipient. Provider-captured fields win over the
/// client-supplied address, which wins over literal defaults. Without a
/// captured address the client address must at least carry line 1.
pub fn resolve_recipient(session: &CheckoutSession, client: &ShippingAddress) -> Result<Recipient> {
    let details = session.customer_details.as_ref();
    let phone = details.and_then(|d| d.phone.clone()).unwrap_or_default();
    let email = details
        .and_then(|d| d.email.clone())
        .or_else(|| session.customer_email.clone())
        .unwrap_or_default();

    if let Some(shipping) = session.shipping.as_ref() {
        if let Some(captured) = shipping.address.as_ref() {
            let name = shipping
                .name
                .clone()
                .or_else(|| details.and_then(|d| d.name.clone()))
                .or_else(|| client.name.clone())
                .unwrap_or_else(|| DEFAULT_RECIPIENT_NAME.to_string());
            return Ok(Recipient {
                name,
                address1: captured.line1.clone().or_else(|| client.address1.clone()).unwrap_or_default(),
                address2: captured.line2.clone().or_else(|| client.address2.clone()).unwrap_or_default(),
                city: captured.city.clone().or_else(|| client.city.clone()).unwrap_or_default(),
                state_code: captured.state.clone().or_else(|| client.state_code.clone()).unwrap_or_default(),
                country_code: captured.country.clone().or_else(|| client.country_code.clone()).unwrap_or_default(),
                zip: captured.postal_code.clone().or_else(|| client.zip.clone()).unwrap_or_default(),
                phone,
                email,
            });
        }
    }

    if !client.has_line1() {
        return Err(ApiError::MissingRecipient);
    }
    Ok(Recipient {
        name: client
            .name
            .clone()
            .or_else(|| details.and_then(|d| d.name.clone()))
            .unwrap_or_else(|| DEFAULT_RECIPIENT_NAME.to_string()),
        address1: client.address1.clone().unwrap_or_default(),
        address2: client.address2.clone().unwrap_or_default(),
        city: client.city.clone().unwrap_or_default(),
        state_code: client.state_code.clone().unwrap_or_default(),
        country_code: client.country_code.clone().unwrap_or_default(),
        zip: client.zip.clone().unwrap_or_default(),
        phone,
        email,
    })
}

/// Assemble the order draft. Pure; submission happens in the dispatcher.
pub fn build_order(
    session_id: &str,
    recipient: Recipient,
    cart_items: &[MetaCartItem],
    shipping_method: Option<&ShippingSelection>,
) -> Result<OrderRequest> {
    if cart_items.is_empty() {
        return Err(ApiError::EmptyCart);
    }
    Ok(OrderRequest {
        external_id: format!("session_{session_id}"),
        recipient,
        items: cart_items
            .iter()
            .map(|item| OrderItem { variant_id: item.variant_id, quantity: item.quantity })
            .collect(),
        confirm: true,
        update_existing: false,
        shipping: shipping_method.and_then(|method| method.id.clone()),
    })
}

/// Shared dispatch path: retrieve, gate on payment status, reconcile,
/// submit once.
pub async fn fulfill_session(state: &AppState, session_id: &str) -> Result<FulfillmentOutcome> {
    let session = state.stripe.retrieve_session(session_id).await?;
    if !session.is_paid() {
        return Err(ApiError::PaymentNotCompleted);
    }
    fulfill_paid_session(state, &session).await
}

pub async fn fulfill_paid_session(state: &AppState, session: &CheckoutSession) -> Result<FulfillmentOutcome> {
    let metadata = parse_metadata(session)?;
    let recipient = resolve_recipient(session, &metadata.shipping_address)?;
    let order = build_order(&session.id, recipient, &metadata.cart_items, metadata.shipping_method.as_ref())?;

    // Claim after the order is known to be buildable; a claim that never
    // submits would block the other path forever.
    if !state.claim_fulfillment(&session.id) {
        tracing::info!(session = %session.id, "fulfillment already handled for session");
        return Ok(FulfillmentOutcome::Duplicate);
    }
    match state.printful.create_order(&order).await {
        Ok(result) => {
            tracing::info!(session = %session.id, "fulfillment order created");
            Ok(FulfillmentOutcome::Submitted(result))
        }
        Err(err) => {
            // Release so a later delivery of either trigger can retry.
            state.release_fulfillment(&session.id);
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stripe::{CustomerDetails, SessionAddress, SessionShipping};

    fn client_address() -> ShippingAddress {
        ShippingAddress {
            name: Some("Ada Lovelace".into()),
            address1: Some("1 Main St".into()),
            city: Some("Toronto".into()),
            state_code: Some("ON".into()),
            country_code: Some("CA".into()),
            zip: Some("M5V 2T6".into()),
            ..ShippingAddress::default()
        }
    }

    fn session_with_captured_city(city: &str) -> CheckoutSession {
        CheckoutSession {
            id: "cs_1".into(),
            payment_status: "paid".into(),
            customer_details: Some(CustomerDetails {
                name: Some("Ada Lovelace".into()),
                email: Some("ada@example.com".into()),
                phone: Some("+1 555 0100".into()),
            }),
            shipping: Some(SessionShipping {
                name: Some("Ada Lovelace".into()),
                address: Some(SessionAddress {
                    line1: Some("99 Queen St W".into()),
                    city: Some(city.into()),
                    state: Some("ON".into()),
                    country: Some("CA".into()),
                    postal_code: Some("M5H 2M9".into()),
                    ..SessionAddress::default()
                }),
            }),
            ..CheckoutSession::default()
        }
    }

    #[test]
    fn test_captured_address_wins_field_by_field() {
        let session = session_with_captured_city("Ottawa");
        let recipient = resolve_recipient(&session, &client_address()).unwrap();
        assert_eq!(recipient.city, "Ottawa");
        assert_eq!(recipient.address1, "99 Queen St W");
        assert_eq!(recipient.phone, "+1 555 0100");
    }

    #[test]
    fn test_captured_gaps_fall_back_to_client_fields() {
        let mut session = session_with_captured_city("Ottawa");
        if let Some(shipping) = session.shipping.as_mut() {
            if let Some(address) = shipping.address.as_mut() {
                address.postal_code = None;
            }
        }
        let recipient = resolve_recipient(&session, &client_address()).unwrap();
        assert_eq!(recipient.zip, "M5V 2T6");
    }

    #[test]
    fn test_client_address_used_when_nothing_captured() {
        let session = CheckoutSession {
            id: "cs_1".into(),
            payment_status: "paid".into(),
            customer_email: Some("ada@example.com".into()),
            ..CheckoutSession::default()
        };
        let recipient = resolve_recipient(&session, &client_address()).unwrap();
        assert_eq!(recipient.address1, "1 Main St");
        assert_eq!(recipient.email, "ada@example.com");
    }

    #[test]
    fn test_missing_recipient_without_line1() {
        let session = CheckoutSession { id: "cs_1".into(), ..CheckoutSession::default() };
        let client = ShippingAddress { city: Some("Toronto".into()), ..ShippingAddress::default() };
        assert!(matches!(resolve_recipient(&session, &client), Err(ApiError::MissingRecipient)));
    }

    #[test]
    fn test_name_defaults_to_customer() {
        let session = CheckoutSession { id: "cs_1".into(), ..CheckoutSession::default() };
        let client = ShippingAddress { address1: Some("1 Main St".into()), ..ShippingAddress::default() };
        assert_eq!(resolve_recipient(&session, &client).unwrap().name, "Customer");
    }

    #[test]
    fn test_builder_copies_line_items_verbatim() {
        let items = vec![
            MetaCartItem { variant_id: 123, quantity: 2, name: None, size: None },
            MetaCartItem { variant_id: 456, quantity: 1, name: Some("Tee".into()), size: Some("M".into()) },
        ];
        let order = build_order("cs_42", Recipient::default(), &items, None).unwrap();
        assert_eq!(order.external_id, "session_cs_42");
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0], OrderItem { variant_id: 123, quantity: 2 });
        assert_eq!(order.items[1], OrderItem { variant_id: 456, quantity: 1 });
        assert!(order.confirm);
        assert!(order.shipping.is_none());
    }

    #[test]
    fn test_builder_rejects_empty_cart() {
        assert!(matches!(
            build_order("cs_42", Recipient::default(), &[], None),
            Err(ApiError::EmptyCart)
        ));
    }

    #[test]
    fn test_builder_attaches_shipping_method() {
        let items = vec![MetaCartItem { variant_id: 123, quantity: 2, name: None, size: None }];
        let method = ShippingSelection { id: Some("STANDARD".into()), ..ShippingSelection::default() };
        let order = build_order("cs_42", Recipient::default(), &items, Some(&method)).unwrap();
        assert_eq!(order.shipping.as_deref(), Some("STANDARD"));
    }

    fn session_with_metadata(entries: &[(&str, String)]) -> CheckoutSession {
        CheckoutSession {
            id: "cs_1".into(),
            metadata: Some(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()),
            ..CheckoutSession::default()
        }
    }

    #[test]
    fn test_metadata_round_trip() {
        let items = vec![MetaCartItem { variant_id: 123, quantity: 2, name: None, size: None }];
        let address = client_address();
        let session = session_with_metadata(&[
            (METADATA_CART_ITEMS, serde_json::to_string(&items).unwrap()),
            (METADATA_SHIPPING_ADDRESS, serde_json::to_string(&address).unwrap()),
            (METADATA_SHIPPING_METHOD, "{}".to_string()),
        ]);
        let metadata = parse_metadata(&session).unwrap();
        assert_eq!(metadata.cart_items, items);
        assert_eq!(metadata.shipping_address, address);
        assert_eq!(metadata.shipping_method, None);
    }

    #[test]
    fn test_metadata_tolerates_string_numbers_and_null() {
        let session = session_with_metadata(&[
            (METADATA_CART_ITEMS, r#"[{"variantId":"123","quantity":2}]"#.to_string()),
            (METADATA_SHIPPING_ADDRESS, "null".to_string()),
            (METADATA_SHIPPING_METHOD, "null".to_string()),
        ]);
        let metadata = parse_metadata(&session).unwrap();
        assert_eq!(metadata.cart_items[0].variant_id, 123);
        assert_eq!(metadata.shipping_address, ShippingAddress::default());
        assert_eq!(metadata.shipping_method, None);
    }

    #[test]
    fn test_metadata_keeps_selected_method() {
        let session = session_with_metadata(&[(
            METADATA_SHIPPING_METHOD,
            r#"{"id":"STANDARD","name":"Flat Rate","rate":"4.39"}"#.to_string(),
        )]);
        let metadata = parse_metadata(&session).unwrap();
        assert_eq!(metadata.shipping_method.unwrap().id.as_deref(), Some("STANDARD"));
    }
}
