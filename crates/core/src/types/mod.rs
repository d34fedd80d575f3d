//! Core types for Cartwheel.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod id;
pub mod price;
pub mod product;
pub mod variant;

pub use id::*;
pub use price::{CurrencyCode, Price};
pub use product::{Category, Product, ProductVariant};
pub use variant::{VariantSelection, VariantSelectionError};
