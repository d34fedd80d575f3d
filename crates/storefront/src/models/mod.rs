//! Domain models for the storefront cart.
//!
//! These types are validated domain objects, separate from database row
//! types and from the serialized local blob.

pub mod cart;
pub mod line_item;

pub use cart::{AddOutcome, Cart, CartOwner, CartTotals};
pub use line_item::{LineItem, ProductSnapshot, clamp_quantity};
