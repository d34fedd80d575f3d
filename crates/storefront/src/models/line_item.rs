//! Line item domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use cartwheel_core::{LineItemId, Product, ProductId, VariantSelection};

/// Product data copied onto a line item so the cart can be shown without a
/// second catalog lookup.
///
/// Price and stock are resolved for the line's variant selection at the time
/// the snapshot is taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    pub image: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Product price before variant modifiers.
    pub base_price: Decimal,
    /// Sum of the selected variants' price modifiers.
    #[serde(default)]
    pub price_modifier: Decimal,
    /// Units available for the selected combination.
    pub stock: u32,
}

impl ProductSnapshot {
    /// Denormalize `product` for the given selection.
    #[must_use]
    pub fn capture(product: &Product, selection: &VariantSelection) -> Self {
        Self {
            name: product.name.clone(),
            image: product.image.clone(),
            category: product.category.as_ref().map(|c| c.name.clone()),
            base_price: product.price,
            price_modifier: product.price_modifier_for(selection),
            stock: product.available_stock_for(selection),
        }
    }

    /// Price of one unit, variant modifiers included.
    #[must_use]
    pub fn unit_price(&self) -> Decimal {
        self.base_price + self.price_modifier
    }
}

/// One product/variant combination in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub product_id: ProductId,
    /// Always at least 1 on a live line.
    pub quantity: u32,
    /// Blobs written before variants existed have no selection at all.
    #[serde(default)]
    pub selected_variants: VariantSelection,
    pub product: ProductSnapshot,
    #[serde(default = "Utc::now")]
    pub added_at: DateTime<Utc>,
}

impl LineItem {
    /// A fresh line holding one unit of `product` with a locally generated ID.
    #[must_use]
    pub fn new(product: &Product, selection: &VariantSelection) -> Self {
        Self {
            id: LineItemId::generate(),
            product_id: product.id,
            quantity: 1,
            selected_variants: selection.clone(),
            product: ProductSnapshot::capture(product, selection),
            added_at: Utc::now(),
        }
    }

    /// Whether this line holds exactly this `(product, selection)` pair.
    #[must_use]
    pub fn matches(&self, product_id: ProductId, selection: &VariantSelection) -> bool {
        self.product_id == product_id && &self.selected_variants == selection
    }

    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.unit_price() * Decimal::from(self.quantity)
    }
}

/// Clamp a requested quantity into `1..=stock`.
///
/// Returns `None` when no quantity is allowed (nothing requested, or nothing
/// in stock), meaning the line should not exist.
#[must_use]
pub fn clamp_quantity(requested: u32, stock: u32) -> Option<u32> {
    if requested == 0 || stock == 0 {
        return None;
    }
    Some(requested.min(stock))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use cartwheel_core::{ProductVariant, VariantId};

    fn hoodie() -> Product {
        let id = ProductId::generate();
        Product {
            id,
            name: "Hoodie".to_owned(),
            description: None,
            price: Decimal::new(4500, 2),
            image: Some("/img/hoodie.png".to_owned()),
            stock: 10,
            featured: true,
            category: None,
            variants: vec![ProductVariant {
                id: VariantId::generate(),
                product_id: id,
                name: "Size".to_owned(),
                value: "XXL".to_owned(),
                price_modifier: Decimal::new(500, 2),
                stock: 2,
            }],
        }
    }

    #[test]
    fn test_new_line_has_one_unit() {
        let product = hoodie();
        let line = LineItem::new(&product, &VariantSelection::new());
        assert_eq!(line.quantity, 1);
        assert_eq!(line.product_id, product.id);
        assert_eq!(line.product.stock, 10);
    }

    #[test]
    fn test_snapshot_resolves_variant() {
        let product = hoodie();
        let selection = VariantSelection::new().with("Size", "XXL");
        let line = LineItem::new(&product, &selection);
        assert_eq!(line.product.unit_price(), Decimal::new(5000, 2));
        assert_eq!(line.product.stock, 2);
    }

    #[test]
    fn test_line_total() {
        let product = hoodie();
        let mut line = LineItem::new(&product, &VariantSelection::new());
        line.quantity = 3;
        assert_eq!(line.line_total(), Decimal::new(13_500, 2));
    }

    #[test]
    fn test_matches_requires_exact_selection() {
        let product = hoodie();
        let selection = VariantSelection::new().with("Size", "XXL");
        let line = LineItem::new(&product, &selection);
        assert!(line.matches(product.id, &selection));
        assert!(!line.matches(product.id, &VariantSelection::new()));
        assert!(!line.matches(ProductId::generate(), &selection));
    }

    #[test]
    fn test_clamp_quantity() {
        assert_eq!(clamp_quantity(0, 5), None);
        assert_eq!(clamp_quantity(3, 0), None);
        assert_eq!(clamp_quantity(3, 5), Some(3));
        assert_eq!(clamp_quantity(9, 5), Some(5));
    }

    #[test]
    fn test_deserialize_without_variants_or_timestamp() {
        let json = format!(
            r#"{{"id":"{}","product_id":"{}","quantity":2,
                "product":{{"name":"Mug","image":null,"base_price":"12.50","stock":4}}}}"#,
            LineItemId::generate(),
            ProductId::generate()
        );
        let line: LineItem = serde_json::from_str(&json).unwrap();
        assert!(line.selected_variants.is_empty());
        assert_eq!(line.product.price_modifier, Decimal::ZERO);
        assert_eq!(line.line_total(), Decimal::new(2500, 2));
    }
}
