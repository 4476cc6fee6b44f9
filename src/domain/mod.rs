//! Domain module
pub mod address;
pub mod cart;
pub mod geo;
pub mod shipping;

pub use address::{AddressSource, ManualEntry, ShippingAddress};
pub use cart::{Cart, CartError, CartItem, SubmitState};
pub use shipping::{select_cheapest, ShippingQuote};
