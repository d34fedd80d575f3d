//! Business logic services for the storefront cart.
//!
//! # Services
//!
//! - `cart` - The cart manager and the store contracts it depends on
//! - `checkout` - Checkout totals and receipts
//! - `identity` - Shopper identity and sign-in notifications

pub mod cart;
pub mod checkout;
pub mod identity;
