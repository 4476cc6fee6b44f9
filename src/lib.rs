//! Print-on-Demand Storefront
//!
//! Storefront backend for print-on-demand products.
//!
//! ## Features
//! - Catalog proxy (stores, products, variant pricing/size data)
//! - Shipping-rate quotes
//! - Hosted checkout sessions with a metadata-carried cart
//! - Checkout-to-fulfillment reconciliation with an idempotency guard

pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod fulfillment;
pub mod printful;
pub mod stripe;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::printful::PrintfulClient;
use crate::stripe::StripeClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub printful: PrintfulClient,
    pub stripe: StripeClient,
    /// Sessions with a fulfillment submission in flight or completed. Both
    /// dispatch paths check-and-set here before submitting.
    fulfilled: Arc<Mutex<HashSet<String>>>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let printful = PrintfulClient::new(&config.printful_api_base, config.printful_token.clone());
        let stripe = StripeClient::new(&config.stripe_api_base, config.stripe_secret_key.clone());
        Self {
            config: Arc::new(config),
            printful,
            stripe,
            fulfilled: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Atomically claim a session for fulfillment. Returns false when some
    /// other path already holds the claim.
    pub fn claim_fulfillment(&self, session_id: &str) -> bool {
        self.ledger().insert(session_id.to_string())
    }

    /// Release a claim after a failed submission so a later trigger can
    /// retry.
    pub fn release_fulfillment(&self, session_id: &str) {
        self.ledger().remove(session_id);
    }

    fn ledger(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.fulfilled.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
