//! Cart controller
//!
//! Owns all client-side cart state behind explicit operations: items,
//! the selected shipping quote, and the submit state machine. Prices are
//! minor currency units (cents).

use uuid::Uuid;

use crate::domain::shipping::{select_cheapest, ShippingQuote};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SubmitState {
    #[default]
    Idle,
    Submitting,
}

#[derive(Clone, Debug, Default)]
pub struct Cart {
    items: Vec<CartItem>,
    selected_quote: Option<ShippingQuote>,
    submit_state: SubmitState,
}

#[derive(Clone, Debug)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: String,
    pub variant_id: i64,
    pub sync_variant_id: Option<i64>,
    pub name: String,
    pub size: String,
    pub price_cents: i64,
    pub image: Option<String>,
    pub quantity: u32,
}

impl CartItem {
    pub fn line_total_cents(&self) -> i64 {
        self.price_cents * i64::from(self.quantity)
    }
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
    pub fn item_count(&self) -> usize {
        self.items.len()
    }
    pub fn submit_state(&self) -> &SubmitState {
        &self.submit_state
    }
    pub fn selected_quote(&self) -> Option<&ShippingQuote> {
        self.selected_quote.as_ref()
    }

    pub fn subtotal_cents(&self) -> i64 {
        self.items.iter().map(CartItem::line_total_cents).sum()
    }

    pub fn shipping_cents(&self) -> i64 {
        self.selected_quote.as_ref().map_or(0, ShippingQuote::rate_cents)
    }

    pub fn total_cents(&self) -> i64 {
        self.subtotal_cents() + self.shipping_cents()
    }

    /// Checkout requires items in the cart, a shipping quote, and no
    /// submission in flight.
    pub fn can_checkout(&self) -> bool {
        !self.items.is_empty() && self.selected_quote.is_some() && self.submit_state == SubmitState::Idle
    }

    /// Adding the same variant/size again merges quantities. Any selected
    /// quote is stale once the items change.
    pub fn add_item(&mut self, item: CartItem) {
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|i| i.variant_id == item.variant_id && i.size == item.size)
        {
            existing.quantity += item.quantity;
        } else {
            self.items.push(item);
        }
        self.selected_quote = None;
    }

    pub fn remove_item(&mut self, id: Uuid) -> Result<(), CartError> {
        let before = self.items.len();
        self.items.retain(|i| i.id != id);
        if self.items.len() == before {
            return Err(CartError::ItemNotFound);
        }
        self.selected_quote = None;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.selected_quote = None;
    }

    /// Keeps the cheapest quote; an empty rate list clears the selection,
    /// so shipping reads as zero and checkout stays disabled.
    pub fn apply_quotes(&mut self, quotes: Vec<ShippingQuote>) {
        self.selected_quote = select_cheapest(quotes);
    }

    pub fn begin_submit(&mut self) -> Result<(), CartError> {
        if self.submit_state == SubmitState::Submitting {
            return Err(CartError::AlreadySubmitting);
        }
        self.submit_state = SubmitState::Submitting;
        Ok(())
    }

    pub fn finish_submit(&mut self) {
        self.submit_state = SubmitState::Idle;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    ItemNotFound,
    AlreadySubmitting,
}
impl std::error::Error for CartError {}
impl std::fmt::Display for CartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound => write!(f, "Item not found"),
            Self::AlreadySubmitting => write!(f, "Checkout already in progress"),
        }
    }
}
