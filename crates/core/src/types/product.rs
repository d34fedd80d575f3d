//! Catalog types: products, their variants, and categories.
//!
//! These are read-only views of the catalog. The storefront never writes
//! them; it only resolves prices and stock for a chosen [`VariantSelection`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::id::{CategoryId, ProductId, VariantId};
use super::variant::VariantSelection;

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// One option value on one axis of a product (e.g., `Size = XL`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductVariant {
    pub id: VariantId,
    pub product_id: ProductId,
    /// Axis name, e.g. "Size".
    pub name: String,
    /// Option value, e.g. "XL".
    pub value: String,
    /// Added to the product's base price when this option is selected.
    pub price_modifier: Decimal,
    /// Units available with this option.
    pub stock: u32,
}

/// A catalog product with its category and variant options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: Option<String>,
    /// Base unit price before variant modifiers.
    pub price: Decimal,
    pub image: Option<String>,
    pub stock: u32,
    pub featured: bool,
    pub category: Option<Category>,
    #[serde(default)]
    pub variants: Vec<ProductVariant>,
}

impl Product {
    /// Variants matched by `selection`, one per selected `(axis, value)` pair
    /// that exists on this product.
    pub fn matched_variants<'a>(
        &'a self,
        selection: &'a VariantSelection,
    ) -> impl Iterator<Item = &'a ProductVariant> {
        self.variants
            .iter()
            .filter(move |v| selection.get(&v.name) == Some(v.value.as_str()))
    }

    /// Sum of price modifiers for the selected options.
    ///
    /// Selected pairs that don't exist on the product contribute nothing.
    #[must_use]
    pub fn price_modifier_for(&self, selection: &VariantSelection) -> Decimal {
        self.matched_variants(selection)
            .map(|v| v.price_modifier)
            .sum()
    }

    /// Unit price for the selection: base price plus modifiers.
    #[must_use]
    pub fn unit_price_for(&self, selection: &VariantSelection) -> Decimal {
        self.price + self.price_modifier_for(selection)
    }

    /// Units available for the selection.
    ///
    /// This is the product stock, further limited by the stock of every
    /// matched variant.
    #[must_use]
    pub fn available_stock_for(&self, selection: &VariantSelection) -> u32 {
        self.matched_variants(selection)
            .map(|v| v.stock)
            .fold(self.stock, u32::min)
    }

    /// Distinct axis names in the order they first appear.
    #[must_use]
    pub fn variant_axes(&self) -> Vec<&str> {
        let mut axes: Vec<&str> = Vec::new();
        for variant in &self.variants {
            if !axes.contains(&variant.name.as_str()) {
                axes.push(&variant.name);
            }
        }
        axes
    }

    /// Whether any units can be sold at all.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.stock > 0
    }
}
